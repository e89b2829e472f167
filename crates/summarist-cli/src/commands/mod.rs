pub mod add;
pub mod batch;
pub mod convert;
pub mod list;
pub mod show;
pub mod summarize;
