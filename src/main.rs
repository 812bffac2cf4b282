//! `Restamp` CLI - Search and visually replace text in PDF files

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use restamp::{PdfEditSession, ReplaceOptions, SearchOptions};

#[derive(Parser)]
#[command(name = "restamp")]
#[command(about = "Search and visually replace text in PDF documents")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find text and print each match with its page rectangle
    Find {
        /// PDF file to search
        file: PathBuf,

        /// Text to search for (literal, not a regex)
        pattern: String,

        /// Match case exactly
        #[arg(short = 'c', long)]
        case_sensitive: bool,

        /// Match whole words only
        #[arg(short, long)]
        whole_word: bool,

        /// Emit matches as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Replace every occurrence and write the modified document
    Replace {
        /// PDF file to modify
        file: PathBuf,

        /// Text to search for (literal, not a regex)
        pattern: String,

        /// Replacement text (empty string erases the match)
        replacement: String,

        /// Output path (defaults to overwriting the input)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Match case exactly
        #[arg(short = 'c', long)]
        case_sensitive: bool,

        /// Match whole words only
        #[arg(short, long)]
        whole_word: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Find { file, pattern, case_sensitive, whole_word, json } => {
            cmd_find(&file, &pattern, case_sensitive, whole_word, json).await?;
        }
        Commands::Replace { file, pattern, replacement, output, case_sensitive, whole_word } => {
            cmd_replace(&file, &pattern, &replacement, output.as_deref(), case_sensitive, whole_word).await?;
        }
    }

    Ok(())
}

fn search_options(pattern: &str, case_sensitive: bool, whole_word: bool) -> SearchOptions {
    SearchOptions {
        search: pattern.to_string(),
        case_sensitive,
        whole_word,
    }
}

async fn cmd_find(file: &Path, pattern: &str, case_sensitive: bool, whole_word: bool, json: bool) -> Result<()> {
    let bytes = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    let mut session = PdfEditSession::new(bytes);
    let matches = session
        .find_text_matches(&search_options(pattern, case_sensitive, whole_word))
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&matches)?);
        return Ok(());
    }

    println!("🔍 {} match(es) for {pattern:?}", matches.len());
    for m in &matches {
        println!(
            "  page {} [{:.1},{:.1} {:.1}x{:.1}]  {}  …{}…",
            m.page_index + 1,
            m.rect.x,
            m.rect.y,
            m.rect.width,
            m.rect.height,
            m.id,
            m.snippet,
        );
    }
    Ok(())
}

async fn cmd_replace(
    file: &Path,
    pattern: &str,
    replacement: &str,
    output: Option<&Path>,
    case_sensitive: bool,
    whole_word: bool,
) -> Result<()> {
    let bytes = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    let mut session = PdfEditSession::new(bytes);
    let outcome = session
        .replace_text(&ReplaceOptions {
            search: search_options(pattern, case_sensitive, whole_word),
            replacement: replacement.to_string(),
        })
        .await?;

    println!("✏️  {} replaced, {} skipped", outcome.replacements, outcome.skipped);

    if outcome.replacements > 0 {
        let target = output.unwrap_or(file);
        std::fs::write(target, session.bytes())
            .with_context(|| format!("writing {}", target.display()))?;
        println!("💾 Saved: {}", target.display());
    } else {
        println!("Document unchanged");
    }
    Ok(())
}
