mod converter;

pub use converter::{collapse_blank_lines, html_to_markdown};
