//! Argument parsing and output formatting for the `pdfqa` binary.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use pdfqa_rag::{Answer, Document, IndexStatus, IngestReport};

/// File extensions `pdfqa ingest` accepts.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "txt", "md"];

/// Ask questions about your documents.
#[derive(Debug, Parser)]
#[command(name = "pdfqa", author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Directory holding the index snapshot (overrides PDFQA_DATA_DIR)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Index one or more documents (.pdf, .txt, .md)
    Ingest {
        /// Files to ingest
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Answer a question from the indexed documents
    Ask {
        /// The question
        question: String,
    },
    /// Show the index status
    Status,
    /// Remove every indexed document
    Rebuild,
}

/// Check that `path` has a supported extension.
pub fn check_extension(path: &Path) -> Result<()> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if !SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
        bail!(
            "unsupported file type for {}: expected one of {}",
            path.display(),
            SUPPORTED_EXTENSIONS.join(", ")
        );
    }
    Ok(())
}

/// Read a file from disk into a [`Document`] named after its file name.
pub async fn read_document(path: &Path) -> Result<Document> {
    check_extension(path)?;
    let bytes =
        tokio::fs::read(path).await.with_context(|| format!("failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .with_context(|| format!("{} has no file name", path.display()))?;
    Ok(Document::new(name, bytes))
}

pub fn format_ingest(report: &IngestReport) -> String {
    format!(
        "{}: {} chunks indexed ({} total)",
        report.document, report.chunks, report.total_entries
    )
}

/// The answer followed by a numbered list of its sources.
pub fn format_answer(answer: &Answer) -> String {
    let mut out = answer.text.trim_end().to_string();
    if !answer.sources.is_empty() {
        out.push_str("\n\nSources:");
        for (i, source) in answer.sources.iter().enumerate() {
            out.push_str(&format!(
                "\n  [{}] {} (chunk {}, score {:.3})",
                i + 1,
                source.chunk.document,
                source.chunk.sequence,
                source.score
            ));
        }
    }
    out
}

pub fn format_status(status: &IndexStatus) -> String {
    let dimensions = status.dimensions.map_or_else(|| "-".to_string(), |d| d.to_string());
    format!(
        "state:      {:?}\ndocuments:  {}\nchunks:     {}\ndimensions: {}",
        status.state, status.documents, status.entries, dimensions
    )
}
