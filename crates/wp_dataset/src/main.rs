//! wp-dataset CLI
//!
//! Frames CSV → split archives → tensor caches, per-round export and cache
//! inspection.

#[cfg(feature = "cli")]
use anyhow::{Context, Result};
#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use std::path::PathBuf;
#[cfg(feature = "cli")]
use wp_core::TransformKind;
#[cfg(feature = "cli")]
use wp_dataset::{store, CsgoDataset, DatasetConfig, DatasetState, Split};

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "wp-dataset")]
#[command(about = "Build win-probability datasets from CS:GO round telemetry", long_about = None)]
struct Cli {
    /// YAML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Dataset folder (overrides config and WP_DATASET_DIR)
    #[arg(long, global = true)]
    folder: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum Commands {
    /// Read the frames CSV and write train/val/test split archives
    Split {
        /// Override the split seed
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Build tensor caches (all splits and transforms unless narrowed)
    Build {
        /// train, val or test
        #[arg(long)]
        split: Option<String>,

        /// basic, multichannel or extended
        #[arg(long)]
        transform: Option<String>,
    },

    /// Write each round of each split as its own CSV under rounds/
    ExportRounds,

    /// Show the on-disk state of every split and transform
    Inspect,

    /// Check the checksums of every cache file
    Verify,
}

#[cfg(feature = "cli")]
fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let config = load_config(&cli)?;

    match cli.command {
        Commands::Split { seed } => {
            let mut config = config;
            if let Some(seed) = seed {
                config.seed = seed;
            }
            println!("Building splits in {} (seed {})", config.folder.display(), config.seed);

            let assignment = wp_dataset::build_splits(&config)
                .with_context(|| format!("failed to build splits from {}", config.frames_path().display()))?;

            let stats = &assignment.stats;
            println!("\nSplits written:");
            println!("   Units:      {}", stats.units);
            println!("   Bad rounds: {}", stats.bad_rounds);
            println!("   Train:      {} rounds", stats.train_rounds);
            println!("   Val:        {} rounds", stats.val_rounds);
            println!("   Test:       {} rounds", stats.test_rounds);
        }

        Commands::Build { split, transform } => {
            let splits = match split {
                Some(s) => vec![s.parse::<Split>()?],
                None => Split::ALL.to_vec(),
            };
            let transforms = match transform {
                Some(t) => vec![t.parse::<TransformKind>()?],
                None => TransformKind::ALL.to_vec(),
            };

            let nav = config.load_nav().context("failed to load navigation meshes")?;

            for split in &splits {
                for transform in &transforms {
                    let dataset = CsgoDataset::builder(config.clone())
                        .split(*split)
                        .transform(*transform)
                        .open(&nav)
                        .with_context(|| format!("failed to build {}/{}", split, transform))?;
                    println!(
                        "{:>5} {:<24} {:>8} samples  {:?}",
                        split,
                        transform.cache_key(),
                        dataset.len(),
                        dataset.features().shape()
                    );
                }
            }
        }

        Commands::ExportRounds => {
            let written = wp_dataset::export_round_files(&config)
                .with_context(|| format!("failed to export rounds under {}", config.folder.display()))?;
            for (split, count) in written {
                println!("{:>5}: {} round files", split, count);
            }
        }

        Commands::Inspect => {
            println!("Dataset folder: {}", config.folder.display());
            for split in Split::ALL {
                let archive = config.split_archive_path(split);
                if archive.exists() {
                    let rounds = store::read_split_archive(&config.folder, split)
                        .with_context(|| format!("failed to read {}", archive.display()))?
                        .rounds
                        .len();
                    println!("\n{} ({} rounds)", split, rounds);
                } else {
                    println!("\n{} (no split archive)", split);
                }

                for transform in TransformKind::ALL {
                    let state = DatasetState::probe(&config.folder, split, transform);
                    let path = config.tensor_cache_path(split, transform);
                    match store::read_metadata(&path)? {
                        Some(meta) if state == DatasetState::Ready => println!(
                            "   {:<24} {:?}  {} ({:.1}%)  {}",
                            transform.cache_key(),
                            state,
                            store::human_bytes(meta.compressed_size),
                            meta.compression_ratio * 100.0,
                            meta.created_at
                        ),
                        _ => println!("   {:<24} {:?}", transform.cache_key(), state),
                    }
                }
            }
        }

        Commands::Verify => {
            let mut checked = 0;
            let mut failed = Vec::new();
            for split in Split::ALL {
                let mut paths = vec![config.split_archive_path(split)];
                paths.extend(TransformKind::ALL.iter().map(|t| config.tensor_cache_path(split, *t)));

                for path in paths.into_iter().filter(|p| p.exists()) {
                    checked += 1;
                    let ok = store::verify_cache(&path)
                        .with_context(|| format!("failed to read {}", path.display()))?;
                    println!("{}  {}", if ok { "ok  " } else { "FAIL" }, path.display());
                    if !ok {
                        failed.push(path);
                    }
                }
            }

            if !failed.is_empty() {
                anyhow::bail!("{} of {} cache files failed verification", failed.len(), checked);
            }
            println!("\n{} cache files verified", checked);
        }
    }

    Ok(())
}

/// `--folder` > `WP_DATASET_DIR` > config file > default.
#[cfg(feature = "cli")]
fn load_config(cli: &Cli) -> Result<DatasetConfig> {
    let config = match &cli.config {
        Some(path) => DatasetConfig::from_yaml_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => DatasetConfig::default(),
    };
    let mut config = config.with_env_overrides();
    if let Some(folder) = &cli.folder {
        config.folder = folder.clone();
    }
    Ok(config)
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("wp-dataset CLI is not available. Enable the 'cli' feature to use it.");
    std::process::exit(1);
}
