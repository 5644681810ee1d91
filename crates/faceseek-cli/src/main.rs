use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod config;
mod gallery;

#[derive(Parser)]
#[command(name = "faceseek", about = "Faceseek CLI — detect, embed, enroll, search")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect candidate face regions in an image
    Detect {
        image: PathBuf,
    },
    /// Print an image's 256-float embedding as JSON
    Embed {
        image: PathBuf,
    },
    /// Add an image's embedding to the gallery
    Enroll {
        image: PathBuf,
        /// Display name for the enrolled identity
        #[arg(short, long)]
        name: String,
    },
    /// Rank the gallery against a query image
    Search {
        image: PathBuf,
        /// Similarity threshold; fractions and percentages both accepted
        #[arg(short, long)]
        threshold: Option<f32>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = config::Config::from_env();
    let engine = config.engine();

    match cli.command {
        Commands::Detect { image } => {
            let img = image::open(&image)
                .with_context(|| format!("reading {}", image.display()))?;
            let regions = engine.detect(&img);
            println!("{} face(s) detected", regions.len());
            for r in &regions {
                println!("  {}x{} at ({}, {})", r.width, r.height, r.x, r.y);
            }
        }
        Commands::Embed { image } => {
            let bytes = std::fs::read(&image)
                .with_context(|| format!("reading {}", image.display()))?;
            let embedding = engine.embed_bytes(&bytes);
            if embedding.is_degenerate() {
                eprintln!("warning: no usable features, emitting sentinel embedding");
            }
            println!("{}", serde_json::to_string(&embedding.values)?);
        }
        Commands::Enroll { image, name } => {
            let bytes = std::fs::read(&image)
                .with_context(|| format!("reading {}", image.display()))?;
            let embedding = engine.embed_bytes(&bytes);
            anyhow::ensure!(
                !embedding.is_degenerate(),
                "could not extract features from {}",
                image.display()
            );

            let mut records = gallery::load(&config.gallery_path)?;
            let record = gallery::GalleryRecord::new(&name, &embedding);
            println!("enrolled {} as {}", name, record.id);
            records.push(record);
            gallery::save(&config.gallery_path, &records)?;
        }
        Commands::Search { image, threshold } => {
            let bytes = std::fs::read(&image)
                .with_context(|| format!("reading {}", image.display()))?;
            let query = engine.embed_bytes(&bytes);
            let records = gallery::load(&config.gallery_path)?;
            let entries = gallery::to_entries(&records);

            let results = engine.search(&query, &entries, threshold);
            if results.is_empty() {
                println!("no matches");
            }
            for m in &results {
                let name = records
                    .iter()
                    .find(|r| r.id == m.id)
                    .map(|r| r.name.as_str())
                    .unwrap_or("?");
                println!("{:.4}  {}  {}", m.score, m.id, name);
            }
        }
    }

    Ok(())
}
