use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use serde::Deserialize;

use pipeline::ProcessorConfig;

use crate::error::AppError;

#[derive(Parser)]
#[command(name = "unchunk", about = "Reassemble chunked stream records into messages")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one shard processor over a record file, checkpointing to a file
    Replay(ReplayArgs),
    /// Gzip and chunk JSON lines into a record file
    Split(SplitArgs),
}

#[derive(Args, Clone, Debug)]
pub struct ReplayArgs {
    /// Path to the TOML config file (optional)
    #[arg(long, default_value = "unchunk.toml", env = "UNCHUNK_CONFIG")]
    pub config: String,

    /// Length-prefixed record file
    #[arg(long)]
    pub input: PathBuf,

    /// File holding the shard checkpoint; replay resumes after it
    #[arg(long, default_value = "unchunk.checkpoint", env = "UNCHUNK_CHECKPOINT")]
    pub checkpoint: PathBuf,

    #[arg(long, env = "UNCHUNK_SHARD_ID")]
    pub shard_id: Option<String>,

    /// Records handed to the processor per batch
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Also write each message as a JSON line to stdout
    #[arg(long)]
    pub print: bool,
}

#[derive(Args, Clone, Debug)]
pub struct SplitArgs {
    /// JSON lines, one message per line
    #[arg(long)]
    pub input: PathBuf,

    /// Record file to write
    #[arg(long)]
    pub output: PathBuf,

    #[arg(long, default_value = "events")]
    pub topic: String,

    #[arg(long, default_value_t = 0)]
    pub partition: i32,

    /// Offset of the first message; each following message gets the next one
    #[arg(long, default_value_t = 0)]
    pub start_offset: i64,

    /// Maximum compressed payload bytes per chunk
    #[arg(long, default_value_t = 1024)]
    pub chunk_size: usize,
}

// ═══════════════════════════════════════════════════════════════
//  Config file (TOML)
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub shard_id: Option<String>,
    pub batch_size: Option<usize>,
    #[serde(default)]
    pub processor: ProcessorConfig,
}

pub fn load_config(path: &str) -> Result<FileConfig, AppError> {
    let content = std::fs::read_to_string(path).map_err(|e| AppError::Config {
        context: "read",
        detail: format!("'{path}': {e}"),
    })?;
    toml::from_str(&content).map_err(|e| AppError::Config {
        context: "parse",
        detail: format!("'{path}': {e}"),
    })
}

// ═══════════════════════════════════════════════════════════════
//  Effective config
// ═══════════════════════════════════════════════════════════════

/// Replay settings after merging: config file < env/CLI.
#[derive(Debug, Clone)]
pub struct Effective {
    pub shard_id: String,
    pub batch_size: usize,
    pub processor: ProcessorConfig,
}

impl Effective {
    pub fn new(args: &ReplayArgs) -> Result<Self, AppError> {
        let cfg = match load_config(&args.config) {
            Ok(c) => c,
            Err(e) => {
                if std::path::Path::new(&args.config).exists() {
                    return Err(e);
                }
                FileConfig::default()
            }
        };

        let batch_size = args.batch_size.or(cfg.batch_size).unwrap_or(100);
        if batch_size == 0 {
            return Err(AppError::Config {
                context: "batch_size",
                detail: "must be at least 1".into(),
            });
        }
        cfg.processor.validate()?;

        Ok(Self {
            shard_id: args
                .shard_id
                .clone()
                .or(cfg.shard_id)
                .unwrap_or_else(|| "shard-0".into()),
            batch_size,
            processor: cfg.processor,
        })
    }
}
