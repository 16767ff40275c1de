use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rparsers")]
#[command(about = "Normalize, fingerprint and extract artifacts from raw HTTP responses")]
#[command(long_about = r#"
Rparsers runs the Rscan content engine over raw HTTP responses saved to disk
(status line, headers, blank line, body).

Usage Examples:
  rparsers decode 'b64de|aGVsbG8='                  # Evaluate a transform expression
  rparsers compare index.raw notfound.raw          # Simhash distance of two responses
  rparsers scan responses/*.raw                    # Fingerprint + extract every file
  rparsers scan -c rules.toml --unique *.raw       # Use configured extractors, dedup matches
  rparsers scan --baseline 404.raw *.raw           # Flag soft-404 look-alikes
"#)]
#[command(version)]
#[command(author)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (engine settings and extractor definitions)
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress output)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Evaluate a transform expression (b64de|, b64en|, unhex|, hex|, md5|)
    Decode {
        /// Expression in operator|payload form
        expression: String,
    },

    /// Compare two raw responses by simhash distance
    Compare {
        /// First raw response file
        first: PathBuf,

        /// Second raw response file
        second: PathBuf,

        /// Near-duplicate threshold (overrides configuration)
        #[arg(long)]
        threshold: Option<u32>,
    },

    /// Normalize, fingerprint and run extractors over raw response files
    Scan {
        /// Raw response files
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Baseline response; files within the threshold of it are flagged as soft
        #[arg(long, value_name = "FILE")]
        baseline: Option<PathBuf>,

        /// Near-duplicate threshold (overrides configuration)
        #[arg(long)]
        threshold: Option<u32>,

        /// Collapse repeated matches
        #[arg(short, long)]
        unique: bool,

        /// Only run extractors carrying this tag
        #[arg(short, long)]
        tag: Option<String>,

        /// Print one JSON object per file instead of the console summary
        #[arg(long)]
        json: bool,

        /// Number of concurrent workers (overrides configuration)
        #[arg(long)]
        workers: Option<usize>,
    },
}
