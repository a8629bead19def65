use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[command(
    name = "capsa",
    about = "Capsa — tamper-evident capsule processing and provenance ledger",
    version,
)]
pub struct Cli {
    /// Unique identifier for the capsule
    #[arg(long)]
    pub capsule_id: Option<String>,

    /// Title for the capsule
    #[arg(long)]
    pub title: Option<String>,

    /// Inline content to store (or use --content-file)
    #[arg(long)]
    pub content: Option<String>,

    /// File containing content to store
    #[arg(long)]
    pub content_file: Option<PathBuf>,

    /// Additional files to include in the capsule
    #[arg(long, num_args = 0..)]
    pub files: Vec<PathBuf>,

    /// JSON metadata for the capsule
    #[arg(long)]
    pub metadata: Option<String>,

    /// Path to the ledger file
    #[arg(long, default_value = "ledger_main.jsonl")]
    pub ledger: PathBuf,

    /// Content-addressed storage directory
    #[arg(long, default_value = "cas")]
    pub cas_dir: PathBuf,

    /// Blackboard file path
    #[arg(long, default_value = "mesh_blackboard.json")]
    pub blackboard: PathBuf,

    /// Merkle summary file path
    #[arg(long, default_value = "mesh_merkle.json")]
    pub merkle: PathBuf,

    /// Archive output directory
    #[arg(long, default_value = "archives")]
    pub archive_dir: PathBuf,

    /// Only validate ledger integrity
    #[arg(long)]
    pub validate_only: bool,

    /// Blackboard merge behavior
    #[arg(long, value_enum, default_value_t = MergeMode::Simplified)]
    pub blackboard_mode: MergeMode,

    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    pub output_format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Json,
    Pretty,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum MergeMode {
    Simplified,
    Tagged,
}
