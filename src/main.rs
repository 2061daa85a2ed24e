use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use photoatlas::cloudinary::{CloudinaryClient, Credentials};
use photoatlas::config::Config;
use photoatlas::{ingest, manifest, report, resize};

#[derive(Parser)]
#[command(author, version, about = "A tool to publish geotagged photo collections and build the map-gallery manifest")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize with a default config file
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,

        /// Path to config file
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// Upload all collections to the remote store
    Upload {
        /// Path to config file
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// Rebuild the photo manifest from the remote store
    Manifest {
        /// Path to config file
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// Downscale already-uploaded assets to cap bandwidth
    Resize {
        /// Path to config file
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// Export extracted coordinates as CSV
    ExportCsv {
        /// Path to config file
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// Print the HTML gallery fragment for one collection
    Gallery {
        /// Path to config file
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Collection name
        collection: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match &cli.command {
        Commands::Init { force, config } => init_config(config, *force),
        Commands::Upload { config } => {
            let config_data = load_config(config)?;
            let client = remote_client()?;

            println!("Uploading {} collections...", config_data.collections.len());
            let report = ingest::Ingestor::new(&client, &config_data).run().await?;

            println!("Uploaded {} photos", report.uploaded);
            if !report.failed_files.is_empty() {
                println!("Skipped oversized files:\n{}", report.failed_files);
            }
            Ok(())
        }
        Commands::Manifest { config } => {
            let config_data = load_config(config)?;
            let client = remote_client()?;
            let manifest_path = PathBuf::from(&config_data.manifest_path);

            println!("Building manifest at {}...", manifest_path.display());
            let records = manifest::ManifestBuilder::new(&client, &config_data)
                .build_and_write(&manifest_path)
                .await?;

            println!("Manifest written with {} entries", records.len());
            Ok(())
        }
        Commands::Resize { config } => {
            let config_data = load_config(config)?;
            let client = remote_client()?;

            println!("Resizing uploaded assets...");
            let outcomes = resize::Resizer::new(&client, &config_data).run().await?;

            let resized = outcomes
                .iter()
                .filter(|o| matches!(o, resize::ResizeOutcome::Resized(_)))
                .count();
            let failed = outcomes
                .iter()
                .filter(|o| matches!(o, resize::ResizeOutcome::Failed(_, _)))
                .count();
            println!(
                "Resized {} of {} assets ({} failed)",
                resized,
                outcomes.len(),
                failed
            );
            Ok(())
        }
        Commands::ExportCsv { config } => {
            let config_data = load_config(config)?;
            let csv_path = PathBuf::from(&config_data.csv_path);

            let rows = report::collect_csv_rows(&config_data)?;
            report::write_csv(&csv_path, &rows)?;

            println!("Wrote {} rows to {}", rows.len(), csv_path.display());
            Ok(())
        }
        Commands::Gallery { config, collection } => {
            let config_data = load_config(config)?;
            let dir = config_data.collection_dir(collection);

            let fragment = report::gallery_fragment(collection, &dir)?;
            println!("{fragment}");
            Ok(())
        }
    }
}

fn remote_client() -> Result<CloudinaryClient> {
    let credentials = Credentials::from_env().context("Cloudinary credentials are not set")?;
    Ok(CloudinaryClient::new(credentials))
}

fn init_config(config_path_opt: &Option<PathBuf>, force: bool) -> Result<()> {
    let config_path = Config::get_config_path(config_path_opt);

    if config_path.exists() && !force {
        println!("Config file already exists at {}", config_path.display());
        println!("Use --force to overwrite");
        return Ok(());
    }

    let config = Config::default();
    config
        .save_to_file(&config_path)
        .with_context(|| format!("Failed to write config to {}", config_path.display()))?;

    println!("Created config file at {}", config_path.display());
    Ok(())
}

fn load_config(config_path_opt: &Option<PathBuf>) -> Result<Config> {
    let config_path = Config::get_config_path(config_path_opt);

    if !config_path.exists() {
        anyhow::bail!(
            "Config file not found at {}. Run 'photoatlas init' to create one.",
            config_path.display()
        );
    }

    Config::load_from_file(&config_path)
}
