mod doctor_cmd;
mod generate_cmd;
mod inspect_cmd;
mod terminal_output;
mod wiring;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use poemforge_config::{config_file_path, load_and_prepare};

#[derive(Parser)]
#[command(name = "poemforge")]
#[command(about = "PoemForge: two AI poets write from a document and a third model judges")]
#[command(version)]
struct Cli {
    /// Config file (defaults to $POEMFORGE_CONFIG or ~/.poemforge/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate and judge two poems from a document
    Generate {
        /// Text, markdown, PDF, DOCX or image file
        document: PathBuf,
        /// Number of verses across both poems
        #[arg(short, long)]
        verses: Option<usize>,
        /// Use this text as context instead of the document's first chunk
        #[arg(short, long)]
        context: Option<String>,
        /// Narrate both poems and the judgment
        #[arg(long)]
        audio: bool,
        /// Directory for poem_results.json and poems.txt
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Load and chunk a document without calling any model
    Inspect {
        document: PathBuf,
    },
    /// Check configuration, API keys and the local retrieval stack
    Doctor {
        /// Also send a one-line prompt to each configured model
        #[arg(long)]
        live: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = config_file_path(cli.config.as_deref());
    let (config, report) = load_and_prepare(&config_path).await?;
    poemforge_logging::init_logger(&config.logging.dir, &config.logging.level)?;
    info!(config = %config_path.display(), "Configuration loaded");

    match cli.command {
        Commands::Generate { document, verses, context, audio, output } => {
            let args = generate_cmd::GenerateArgs { document, verses, context, audio, output };
            generate_cmd::run(&config, &report, args).await
        }
        Commands::Inspect { document } => inspect_cmd::run(&config, &document).await,
        Commands::Doctor { live } => doctor_cmd::run(&config, &report, &config_path, live).await,
    }
}
