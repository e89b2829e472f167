use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};

use summarist_core::markdown::html_to_markdown;

pub fn run(file: Option<&Path>) -> Result<()> {
    let html = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut html = String::new();
            std::io::stdin()
                .read_to_string(&mut html)
                .context("failed to read stdin")?;
            html
        }
    };

    print!("{}", html_to_markdown(&html));

    Ok(())
}
