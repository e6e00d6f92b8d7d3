//! vhdxlog CLI
//!
//! Inspect, replay and write through the log of a VHDX image.

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};
use vhdxlog::format::MIB;
use vhdxlog::{Config, FileImage, Journal, LogError, Result, VhdxHeaders};

/// vhdxlog
#[derive(Parser, Debug)]
#[command(name = "vhdxlog")]
#[command(about = "Inspect and replay the write-ahead log of VHDX images")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create an empty image with headers and a log region
    Init {
        /// Image file to create
        image: PathBuf,

        /// Log region offset in MiB
        #[arg(long, default_value = "1")]
        log_offset_mb: u64,

        /// Log region length in MiB
        #[arg(long, default_value = "1")]
        log_length_mb: u32,
    },

    /// Show the active log sequence without replaying it
    Inspect {
        /// Image file
        image: PathBuf,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Replay a pending log onto the image
    Replay {
        /// Image file
        image: PathBuf,
    },

    /// Write a file's contents into the image through the log
    Write {
        /// Image file
        image: PathBuf,

        /// Target byte offset in the image
        #[arg(short, long)]
        offset: u64,

        /// File holding the bytes to write
        #[arg(short, long)]
        input: PathBuf,
    },
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,vhdxlog=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args.command) {
        tracing::error!("{}", e);
        process::exit(1);
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Init {
            image,
            log_offset_mb,
            log_length_mb,
        } => {
            let log_offset = mib_to_bytes(log_offset_mb, "log offset")?;
            let log_length = u32::try_from(mib_to_bytes(log_length_mb as u64, "log length")?)
                .map_err(|_| LogError::Config(format!("log length {} MiB too large", log_length_mb)))?;
            let mut file = FileImage::create(&image)?;
            VhdxHeaders::create(&mut file, log_offset, log_length)?;
            tracing::info!("Created {} with a {} MiB log", image.display(), log_length_mb);
            Ok(())
        }

        Commands::Inspect { image, json } => {
            let journal = open_journal(&image, true)?;
            let sequence = journal.scan()?;
            let region = journal.region();

            if json {
                let report = serde_json::json!({
                    "image": image.display().to_string(),
                    "region": region,
                    "active_sequence": sequence,
                });
                let text = serde_json::to_string_pretty(&report)
                    .map_err(|e| LogError::Config(format!("cannot render report: {}", e)))?;
                println!("{}", text);
                return Ok(());
            }

            println!("log offset: {}", region.file_offset);
            println!("log length: {}", region.length);
            println!("log guid:   {}", region.guid);
            match sequence {
                Some(seq) => {
                    println!("pending log: {} entries", seq.count);
                    println!("  read={} write={}", seq.log.read, seq.log.write);
                    println!("  last sequence number: {}", seq.last_sequence());
                }
                None => println!("no pending log"),
            }
            Ok(())
        }

        Commands::Replay { image } => {
            let journal = open_journal(&image, false)?;
            if journal.parse_and_replay_log(false)? {
                println!("log replayed");
            } else {
                println!("no pending log");
            }
            Ok(())
        }

        Commands::Write {
            image,
            offset,
            input,
        } => {
            let data = std::fs::read(&input)?;
            let journal = open_journal(&image, false)?;
            journal.parse_and_replay_log(false)?;
            journal.append_write_and_flush(&data, offset)?;
            println!("wrote {} bytes at offset {}", data.len(), offset);
            Ok(())
        }
    }
}

/// `mb` MiB in bytes, refusing values that overflow
fn mib_to_bytes(mb: u64, what: &str) -> Result<u64> {
    mb.checked_mul(MIB)
        .ok_or_else(|| LogError::Config(format!("{} {} MiB too large", what, mb)))
}

fn open_journal(path: &Path, read_only: bool) -> Result<Journal<FileImage, VhdxHeaders>> {
    let mut file = FileImage::open(path, read_only)?;
    let headers = VhdxHeaders::load(&mut file)?;

    let config = Config::builder()
        .read_only(read_only)
        .image_name(path.display().to_string())
        .build()?;

    Journal::new(file, headers, config)
}
