//! `poemforge generate`: load, index, run both poets, judge, write results.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use poemforge_agent::{derive_context, render_json, render_text, OutputRecord, RunFailure, RunMetadata};
use poemforge_config::{PoemForgeConfig, ValidationReport};
use poemforge_core::{DocumentLoader, Speaker};
use poemforge_logging::{RunEvent, RunEventLogger};
use poemforge_memory::VectorRetriever;
use poemforge_tts::{judgment_narration, poem_narration, NarrationItem, NarrationReport};

use crate::terminal_output::{banner, note_error, note_info, note_success, note_warn, print_judgment, print_poem};
use crate::wiring;

pub const RESULTS_JSON: &str = "poem_results.json";
pub const POEMS_TEXT: &str = "poems.txt";

pub struct GenerateArgs {
    pub document: PathBuf,
    pub verses: Option<usize>,
    pub context: Option<String>,
    pub audio: bool,
    pub output: Option<PathBuf>,
}

pub async fn run(config: &PoemForgeConfig, report: &ValidationReport, args: GenerateArgs) -> Result<()> {
    if !report.is_valid() {
        for e in &report.errors {
            note_error(&format!("{}: {}", e.path, e.message));
        }
        bail!("configuration has {} error(s)", report.errors.len());
    }
    let verses = args.verses.unwrap_or(config.run.verses);
    let output_dir = args.output.clone().unwrap_or_else(|| PathBuf::from(&config.output.dir));

    banner("PoemForge");
    note_info(&format!("Loading {}", args.document.display()));
    let document = wiring::loader(config)
        .load(&args.document)
        .await
        .with_context(|| format!("failed to load {}", args.document.display()))?;
    note_success(&format!("Extracted {} chunk(s)", document.chunks.len()));
    if document.image_derived {
        note_info("Context comes from AI vision analysis of the image");
    }

    let retriever = Arc::new(VectorRetriever::new(wiring::embedder(&config.embeddings)?));
    let indexed = retriever.index(&document.chunks).await?;
    note_success(&format!("Indexed {indexed} chunk(s) for retrieval"));

    let context = derive_context(&document.chunks, args.context.as_deref())?;
    note_info(&format!("Context: {} chars", context.chars().count()));

    let pipeline = wiring::pipeline(config, retriever)?;
    let (label_a, label_b) = pipeline.poet_labels();
    note_info(&format!("Generating {verses} verse(s): {label_a} vs {label_b}"));

    let completed = match pipeline.run(&context, verses).await {
        Ok(run) => run,
        Err(failure) => {
            report_failure(&failure, label_a, label_b);
            return Err(failure.into());
        }
    };

    let metadata = RunMetadata::for_session(
        &completed.session,
        args.document.display().to_string(),
        document.image_derived,
        label_a,
        label_b,
    );
    let record = completed.record(&metadata);

    banner("RESULTS");
    print_poem("Poem A", record.poem_a.agent, &record.poem_a.verses);
    print_poem("Poem B", record.poem_b.agent, &record.poem_b.verses);
    print_judgment(&completed.judgment, label_a, label_b);

    let (json_path, text_path) = write_outputs(&output_dir, &record).await?;
    note_success(&format!("Results saved to {}", json_path.display()));
    note_success(&format!("Poems saved to {}", text_path.display()));

    if args.audio {
        let audio_dir = PathBuf::from(&config.output.audio_dir);
        match wiring::narrator(config) {
            Ok(narrator) => {
                let report = narrator.narrate(narration_items(&record)).await;
                save_audio(&audio_dir, &report, &completed.session.id().to_string()).await;
            }
            Err(e) => note_warn(&format!("Audio skipped: {e:#}")),
        }
    }

    Ok(())
}

fn report_failure(failure: &RunFailure, label_a: &str, label_b: &str) {
    note_error(&format!(
        "Run failed ({:?}) after {} verse(s): {}",
        failure.kind, failure.last_successful_turn, failure.error
    ));
    if let Some(session) = &failure.session {
        for turn in session.turns() {
            let label = match turn.speaker() {
                Speaker::ProviderA => label_a,
                Speaker::ProviderB => label_b,
            };
            println!("  {}. [{label}] {}", turn.index(), turn.text());
        }
    }
}

/// Write `poem_results.json` and `poems.txt` into `dir`.
pub async fn write_outputs(dir: &Path, record: &OutputRecord<'_>) -> Result<(PathBuf, PathBuf)> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("failed to create {}", dir.display()))?;

    let json_path = dir.join(RESULTS_JSON);
    tokio::fs::write(&json_path, render_json(record)?)
        .await
        .with_context(|| format!("failed to write {}", json_path.display()))?;

    let text_path = dir.join(POEMS_TEXT);
    tokio::fs::write(&text_path, render_text(record))
        .await
        .with_context(|| format!("failed to write {}", text_path.display()))?;

    info!(dir = %dir.display(), "Results written");
    Ok((json_path, text_path))
}

pub fn narration_items(record: &OutputRecord<'_>) -> Vec<NarrationItem> {
    vec![
        NarrationItem::new("poem_a", poem_narration(record.poem_a.agent, &record.poem_a.verses)),
        NarrationItem::new("poem_b", poem_narration(record.poem_b.agent, &record.poem_b.verses)),
        NarrationItem::new("judgment", judgment_narration(record.judgment.raw_text())),
    ]
}

/// Audio is optional: a failure to write clips is reported and the run
/// still succeeds. Returns whether every clip was written.
async fn save_audio(dir: &Path, report: &NarrationReport, session_id: &str) -> bool {
    match write_audio(dir, report, session_id).await {
        Ok(()) => true,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "Audio not saved");
            note_warn(&format!("Audio not saved: {e:#}"));
            false
        }
    }
}

/// Write synthesized clips; skipped items are reported, never fatal.
async fn write_audio(dir: &Path, report: &NarrationReport, session_id: &str) -> Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("failed to create {}", dir.display()))?;
    for clip in &report.clips {
        let path = dir.join(clip.file_name());
        tokio::fs::write(&path, &clip.bytes)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        note_success(&format!("Audio saved to {}", path.display()));
    }
    for (item, error) in &report.skipped {
        warn!(item = %item, error = %error, "Audio skipped");
        RunEventLogger::log_event(
            session_id,
            RunEvent::AudioSkipped { item: item.clone(), error: error.to_string() },
        );
        note_warn(&format!("No audio for {item}: {error}"));
    }
    Ok(())
}
