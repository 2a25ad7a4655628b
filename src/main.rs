//! NGFF Streamer - lazy multiscale reads from OME-NGFF pyramids.
//!
//! This binary opens a pyramid from a local directory or S3 and either
//! prints its layout or reads a region through the resolution multiplexer.

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ngff_streamer::{
    config::{Cli, Command, InfoConfig, ReadConfig, SourceConfig, SourceLocation},
    create_s3_client, ChunkStore, ChunkedArray, FsStore, GridSource, OpenOptions, Pyramid, PyramidError,
    ReadError, S3Store, SampleBlock, DEFAULT_LEVEL_STEP, DEFAULT_MULTIPLEXED_STEP,
};

type DynStore = Arc<dyn ChunkStore>;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Info(config) => run_info(config).await,
        Command::Read(config) => run_read(config).await,
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "ngff_streamer=debug"
    } else {
        "ngff_streamer=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build the chunk store for the configured source.
async fn create_store(config: &SourceConfig) -> Result<DynStore, String> {
    match config.location()? {
        SourceLocation::Local(path) => {
            let is_dir = tokio::fs::metadata(&path)
                .await
                .map(|m| m.is_dir())
                .unwrap_or(false);
            if !is_dir {
                return Err(format!("{} is not a directory", path.display()));
            }
            Ok(Arc::new(FsStore::new(path)))
        }
        SourceLocation::S3 { bucket, prefix } => {
            info!("  S3 bucket: {}", bucket);
            if let Some(ref endpoint) = config.s3_endpoint {
                info!("  S3 endpoint: {}", endpoint);
            }
            info!("  S3 region: {}", config.s3_region);
            let client = create_s3_client(config.s3_endpoint.as_deref(), &config.s3_region).await;
            Ok(Arc::new(S3Store::new(client, bucket, prefix)))
        }
    }
}

async fn open_pyramid(config: &SourceConfig) -> Result<Pyramid<DynStore>, String> {
    config.validate()?;
    let store = create_store(config).await?;
    let options = OpenOptions {
        cache_capacity: config.cache_capacity(),
        name: None,
    };
    Pyramid::open(store, options)
        .await
        .map_err(|e: PyramidError| e.to_string())
}

// =============================================================================
// Info Command
// =============================================================================

async fn run_info(config: InfoConfig) -> ExitCode {
    init_logging(config.source.verbose);

    let pyramid = match open_pyramid(&config.source).await {
        Ok(p) => p,
        Err(e) => {
            error!("Failed to open {}: {}", config.source.source, e);
            return ExitCode::FAILURE;
        }
    };

    let factors = match pyramid.factors() {
        Ok(f) => Some(f),
        Err(e) => {
            warn!("Levels cannot be multiplexed: {}", e);
            None
        }
    };

    let levels: Vec<_> = pyramid
        .levels()
        .iter()
        .enumerate()
        .map(|(i, level)| {
            let array = level.array();
            serde_json::json!({
                "path": level.path(),
                "shape": array.shape(),
                "chunks": array.chunk_shape(),
                "dtype": array.data_type().name(),
                "pixel_size": level.pixel_size(),
                "factor": factors.as_ref().map(|f| f[i]),
            })
        })
        .collect();

    if config.json {
        let report = serde_json::json!({
            "name": pyramid.name(),
            "scales": pyramid.scales(),
            "axes": pyramid.multiscales().axes,
            "levels": levels,
        });
        match serde_json::to_string_pretty(&report) {
            Ok(s) => println!("{}", s),
            Err(e) => {
                error!("Failed to serialize report: {}", e);
                return ExitCode::FAILURE;
            }
        }
        return ExitCode::SUCCESS;
    }

    println!("Pyramid: {}", pyramid.name());
    println!("═════════════════════════════════");
    println!("Scales: {}", pyramid.scales().join(", "));
    for axis in &pyramid.multiscales().axes {
        println!(
            "Axis {}: {:?} ({})",
            axis.name,
            axis.kind,
            axis.unit.as_deref().unwrap_or("unitless")
        );
    }
    println!();
    println!("Levels (coarsest first):");
    for (i, level) in pyramid.levels().iter().enumerate() {
        let array = level.array();
        let factor = factors
            .as_ref()
            .map(|f| format!("x{}", f[i]))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:>4}  shape {:?}  chunks {:?}  {}  pixel {:?} Å  {}",
            level.path(),
            array.shape(),
            array.chunk_shape(),
            array.data_type(),
            level.pixel_size(),
            factor
        );
    }

    ExitCode::SUCCESS
}

// =============================================================================
// Read Command
// =============================================================================

async fn run_read(config: ReadConfig) -> ExitCode {
    init_logging(config.source.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let pyramid = match open_pyramid(&config.source).await {
        Ok(p) => p,
        Err(e) => {
            error!("Failed to open {}: {}", config.source.source, e);
            return ExitCode::FAILURE;
        }
    };

    let result = match config.scales {
        Some(ref scales) => {
            let scales: Vec<&str> = scales.iter().map(String::as_str).collect();
            match pyramid.level_grids(&scales) {
                Ok(grids) => {
                    let mut result = Ok(());
                    for grid in &grids {
                        result = read_grid(grid, &config, DEFAULT_LEVEL_STEP).await;
                        if result.is_err() {
                            break;
                        }
                    }
                    result.map_err(|e| e.to_string())
                }
                Err(e) => Err(e.to_string()),
            }
        }
        None => match pyramid.multiplexed() {
            Ok(grid) => {
                let step = config.step().unwrap_or(DEFAULT_MULTIPLEXED_STEP);
                if let Ok(strategy) = grid.strategy(step) {
                    info!(
                        "Step {:?} served by level {} with residual step {:?}",
                        step,
                        grid.levels()[strategy.level].name(),
                        strategy.residual_step
                    );
                }
                read_grid(&grid, &config, DEFAULT_MULTIPLEXED_STEP)
                    .await
                    .map_err(|e| e.to_string())
            }
            Err(e) => Err(e.to_string()),
        },
    };

    if let Err(e) = result {
        error!("Read failed: {}", e);
        return ExitCode::FAILURE;
    }

    let stats = pyramid.cache().stats();
    println!(
        "Cache: {} hits, {} misses, {} fetches, {} entries",
        stats.hits,
        stats.misses,
        stats.fetches,
        pyramid.cache().len().await
    );

    ExitCode::SUCCESS
}

async fn read_grid<G: GridSource>(
    grid: &G,
    config: &ReadConfig,
    default_step: [u64; 3],
) -> Result<(), ReadError> {
    let initial = grid.initial_region(config.step().unwrap_or(default_step));
    let origin = config.origin().unwrap_or(initial.origin);
    let size = config.size().unwrap_or(initial.size);

    let started = Instant::now();
    let block = grid.read(origin, Some(size), initial.step).await?;
    let elapsed = started.elapsed();

    println!("{}", grid.name());
    println!("  origin {:?}  size {:?}  step {:?}", origin, size, initial.step);
    print_summary(&block);
    println!("  read in {:.1} ms", elapsed.as_secs_f64() * 1000.0);
    Ok(())
}

fn print_summary(block: &SampleBlock) {
    let values = block.to_f64();
    println!("  block {:?} of {}", block.shape(), block.data_type());
    if values.is_empty() {
        println!("  (empty)");
        return;
    }
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    println!("  min {}  max {}  mean {:.4}", min, max, mean);
}
