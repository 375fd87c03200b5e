use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use mcumgr_upload::commands::inspect_firmware;
use mcumgr_upload::dfu::{ByteAlignment, UploadConfiguration};

#[derive(Parser)]
#[command(name = "mcumgr-upload", version, about = "Inspect firmware for MCUmgr image upload")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve a firmware file and show what would be uploaded
    Inspect {
        /// Package (.zip / .bin) or SUIT envelope
        file: PathBuf,

        /// Number of buffers (2-8); 2 disables pipelining
        #[arg(long, value_parser = clap::value_parser!(u32).range(2..=8))]
        buffers: Option<u32>,

        /// Byte alignment: disabled, 2, 4, 8 or 16
        #[arg(long, default_value = "disabled")]
        alignment: ByteAlignment,

        /// Reassembly buffer size in bytes, 0 for the transport default
        #[arg(long, default_value = "0")]
        chunk_size: String,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Command::Inspect {
            file,
            buffers,
            alignment,
            chunk_size,
            json,
        } => {
            let mut config = UploadConfiguration::default();
            if let Some(buffers) = buffers {
                config.set_buffer_count(buffers);
            }
            config.set_byte_alignment(alignment);
            config.set_chunk_size(&chunk_size);

            let summary = match inspect_firmware(file, config).await {
                Ok(summary) => summary,
                Err(e) => {
                    error!("{}", e);
                    return ExitCode::FAILURE;
                }
            };

            if json {
                match serde_json::to_string_pretty(&summary) {
                    Ok(text) => println!("{}", text),
                    Err(e) => {
                        error!("Failed to serialize summary: {}", e);
                        return ExitCode::FAILURE;
                    }
                }
            } else {
                print!("{}", summary);
            }
            ExitCode::SUCCESS
        }
    }
}
