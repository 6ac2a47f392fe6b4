use anyhow::Result;
use clap::{Parser, Subcommand};
use cli::commands;
use selfie_core::backend;
use selfie_core::config;
use selfie_core::identity::DeviceIdentityProvider;
use selfie_core::models::PhotoSummary;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load(cli.config.as_deref())?;
    let session = backend::open_session(cfg).await?;

    match cli.command {
        Commands::DeviceId => {
            println!("{}", session.identity.device_identifier());
            Ok(())
        }
        Commands::Upload { path, name, json } => {
            let summary = commands::upload_photo(&session.client, &path, name.as_deref()).await?;
            print_photos(&[summary], json)
        }
        Commands::List { device, json } => {
            let device = commands::target_device(device, &session.identity);
            let photos = commands::list_photos(&session.client, &device).await?;
            print_photos(&photos, json)
        }
        Commands::Fetch {
            out,
            device,
            slots,
            json,
        } => {
            let device = commands::target_device(device, &session.identity);
            let slots = slots.unwrap_or(session.config.grid.slots);
            let summary =
                commands::fetch_photos(session.client.clone(), &device, &out, slots).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                for path in &summary.written {
                    println!("{}", path.display());
                }
                println!(
                    "Fetched {} of {} photo(s), {} without image.",
                    summary.written.len(),
                    summary.listed,
                    summary.missing
                );
            }
            Ok(())
        }
    }
}

#[derive(Parser)]
#[command(name = "selfie")]
#[command(about = "Upload and browse this device's selfies", long_about = None)]
struct Cli {
    /// Path to config TOML
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print this installation's device identifier
    DeviceId,
    /// Upload a picture as a new photo
    Upload {
        /// Image file (JPEG or PNG)
        path: PathBuf,
        /// Photo name; defaults to the file stem
        #[arg(long)]
        name: Option<String>,
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// List photos uploaded from a device
    List {
        /// Device identifier; defaults to this installation
        #[arg(long)]
        device: Option<String>,
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// Download photos into a directory
    Fetch {
        /// Destination directory
        #[arg(long)]
        out: PathBuf,
        /// Device identifier; defaults to this installation
        #[arg(long)]
        device: Option<String>,
        /// Number of concurrent grid slots
        #[arg(long)]
        slots: Option<usize>,
        /// Output JSON summary
        #[arg(long)]
        json: bool,
    },
}

fn print_photos(photos: &[PhotoSummary], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(photos)?);
        return Ok(());
    }
    for p in photos {
        println!(
            "{}\t{}\t{}\t{}",
            p.id.map(|id| id.to_string()).unwrap_or_else(|| "-".into()),
            p.name,
            p.created_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "-".into()),
            p.url.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}
