//! EmberKV CLI
//!
//! Command-line interface that opens an engine on a storage prefix and runs
//! one command against it.

use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use emberkv::storage::StoragePaths;
use emberkv::wal::WalRecovery;
use emberkv::{Config, Engine};
use tracing_subscriber::{fmt, EnvFilter};

/// EmberKV CLI
#[derive(Parser, Debug)]
#[command(name = "emberkv-cli")]
#[command(about = "CLI for the EmberKV storage engine")]
#[command(version)]
struct Args {
    /// Storage prefix (directory plus file name stem)
    #[arg(short, long, default_value = "./emberkv_data/ember")]
    prefix: PathBuf,

    /// Flush after this many distinct keys
    #[arg(short, long)]
    key_threshold: Option<usize>,

    /// Flush after this many log bytes
    #[arg(short, long)]
    size_threshold: Option<u64>,

    /// Flush inline instead of on a background thread
    #[arg(long)]
    inline_flush: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Set {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Read `key<TAB>value` lines from stdin and set each
    Load,

    /// Print memtable and segment statistics
    Stats,

    /// Check the active log without modifying it
    VerifyLog,
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_target(true).with_writer(io::stderr).init();

    let args = Args::parse();
    if let Err(e) = run(args) {
        tracing::error!("{}", e);
        eprintln!("error: {}", e);
        process::exit(1);
    }
}

fn run(args: Args) -> emberkv::Result<()> {
    if matches!(args.command, Commands::VerifyLog) {
        return verify_log(&args.prefix);
    }

    let mut builder = Config::builder()
        .storage_prefix(&args.prefix)
        .background_flush(!args.inline_flush);
    if let Some(keys) = args.key_threshold {
        builder = builder.key_threshold(keys);
    }
    if let Some(bytes) = args.size_threshold {
        builder = builder.size_threshold(bytes);
    }

    let engine = Engine::open(builder.build())?;

    match args.command {
        Commands::Get { key } => match engine.get(key.as_bytes())? {
            Some(value) => println!("{}", String::from_utf8_lossy(&value)),
            None => println!("(nil)"),
        },
        Commands::Set { key, value } => {
            engine.set(key.as_bytes(), value.as_bytes())?;
            println!("OK");
        }
        Commands::Load => {
            let mut loaded = 0usize;
            for line in io::stdin().lock().lines() {
                let line = line?;
                let Some((key, value)) = line.split_once('\t') else {
                    tracing::warn!(line = %line, "skipping line without a tab");
                    continue;
                };
                engine.set(key.as_bytes(), value.as_bytes())?;
                loaded += 1;
            }
            println!("loaded {} records", loaded);
        }
        Commands::Stats => {
            println!("memtable keys: {}", engine.memtable_key_count());
            println!("memtable log bytes: {}", engine.memtable_size());
            println!("segments: {:?}", engine.segment_ids());
        }
        // Runs without opening the engine
        Commands::VerifyLog => {}
    }

    engine.close()
}

fn verify_log(prefix: &Path) -> emberkv::Result<()> {
    let log_path = StoragePaths::new(prefix)?.log_path();
    let result = WalRecovery::verify(&log_path)?;
    println!(
        "records: {}\nvalid bytes: {}\ntorn tail: {}",
        result.records_recovered, result.valid_bytes, result.was_truncated
    );
    Ok(())
}
