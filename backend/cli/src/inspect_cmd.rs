//! `poemforge inspect`: show what the loader makes of a document.

use std::path::Path;

use anyhow::{Context, Result};

use poemforge_agent::derive_context;
use poemforge_config::PoemForgeConfig;
use poemforge_core::DocumentLoader;

use crate::terminal_output::{note_info, note_success, render_table, Column};
use crate::wiring;

const PREVIEW_CHARS: usize = 200;

fn preview(text: &str, max: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > max {
        format!("{}...", flat.chars().take(max).collect::<String>())
    } else {
        flat
    }
}

pub async fn run(config: &PoemForgeConfig, document: &Path) -> Result<()> {
    let loaded = wiring::loader(config)
        .load(document)
        .await
        .with_context(|| format!("failed to load {}", document.display()))?;

    note_success(&format!("{} chunk(s) from {}", loaded.chunks.len(), document.display()));
    if loaded.image_derived {
        note_info("Image input: text comes from vision analysis");
    }

    let rows: Vec<Vec<String>> = loaded
        .chunks
        .iter()
        .enumerate()
        .map(|(i, c)| vec![i.to_string(), c.text.chars().count().to_string(), preview(&c.text, 60)])
        .collect();
    print!("{}", render_table(&[Column::right("#"), Column::right("Chars"), Column::left("Text")], &rows));

    let context = derive_context(&loaded.chunks, None)?;
    println!("\nContext preview: {}", preview(&context, PREVIEW_CHARS));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_flattens_and_truncates() {
        assert_eq!(preview("a\n\nb  c", 10), "a b c");
        assert_eq!(preview("abcdefghij", 4), "abcd...");
    }

    #[tokio::test]
    async fn inspects_text_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "Lichens grow slowly on granite.").unwrap();
        run(&PoemForgeConfig::default(), &path).await.unwrap();
    }

    #[tokio::test]
    async fn unsupported_format_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        std::fs::write(&path, "a,b").unwrap();
        assert!(run(&PoemForgeConfig::default(), &path).await.is_err());
    }
}
