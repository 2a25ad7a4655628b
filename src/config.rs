//! Command-line configuration for the NGFF streamer binary.
//!
//! Every option can also be set through an environment variable with the
//! `NGFF_` prefix:
//!
//! - `NGFF_SOURCE` - Pyramid location: a local path, `file://` URL or `s3://bucket/prefix`
//! - `NGFF_S3_ENDPOINT` - Custom S3 endpoint for S3-compatible services
//! - `NGFF_S3_REGION` - AWS region (default: us-east-1)
//! - `NGFF_CACHE_CHUNKS` - Max chunks to cache, 0 for no limit (default: 0)
//! - `NGFF_SCALES` - Comma-separated scale paths to read individually
//!
//! The library itself never reads the environment; the binary turns these
//! options into [`OpenOptions`](crate::pyramid::OpenOptions) and a store.

use std::num::NonZeroUsize;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use url::Url;

// =============================================================================
// Default Values
// =============================================================================

/// Default AWS region.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Default chunk cache capacity (0 = unbounded).
pub const DEFAULT_CACHE_CHUNKS: usize = 0;

// =============================================================================
// CLI Arguments
// =============================================================================

/// NGFF Streamer - lazy multiscale reads from OME-NGFF pyramids.
#[derive(Parser, Debug, Clone)]
#[command(name = "ngff-streamer")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn into_command(self) -> Command {
        self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print the pyramid descriptor and level layout
    Info(InfoConfig),

    /// Read a strided region and print a summary of the samples
    Read(ReadConfig),
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct SourceConfig {
    /// Pyramid location: local path, file:// URL or s3://bucket/prefix.
    #[arg(env = "NGFF_SOURCE")]
    pub source: String,

    /// Custom S3 endpoint URL for S3-compatible services (MinIO, etc.).
    #[arg(long, env = "NGFF_S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// AWS region for S3.
    #[arg(long, default_value = DEFAULT_REGION, env = "NGFF_S3_REGION")]
    pub s3_region: String,

    /// Maximum number of chunks to keep in memory (0 = no limit).
    #[arg(long, default_value_t = DEFAULT_CACHE_CHUNKS, env = "NGFF_CACHE_CHUNKS")]
    pub cache_chunks: usize,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

/// Where the pyramid lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    Local(PathBuf),
    S3 { bucket: String, prefix: String },
}

impl SourceConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        self.location().map(|_| ())
    }

    /// Resolve the source string into a store location.
    ///
    /// Strings that do not parse as absolute URLs are taken as local paths.
    pub fn location(&self) -> Result<SourceLocation, String> {
        let source = self.source.trim();
        if source.is_empty() {
            return Err("Source is required. Pass a path or set NGFF_SOURCE".to_string());
        }

        let url = match Url::parse(source) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                return Ok(SourceLocation::Local(PathBuf::from(source)))
            }
            Err(e) => return Err(format!("Invalid source '{}': {}", source, e)),
        };

        match url.scheme() {
            "file" => url
                .to_file_path()
                .map(SourceLocation::Local)
                .map_err(|_| format!("Invalid file URL '{}'", source)),
            "s3" => {
                let bucket = url
                    .host_str()
                    .filter(|b| !b.is_empty())
                    .ok_or_else(|| format!("S3 URL '{}' has no bucket", source))?;
                Ok(SourceLocation::S3 {
                    bucket: bucket.to_string(),
                    prefix: url.path().trim_matches('/').to_string(),
                })
            }
            other => Err(format!(
                "Unsupported source scheme '{}'. Use a local path, file:// or s3://",
                other
            )),
        }
    }

    /// Chunk cache bound; `None` means unbounded.
    pub fn cache_capacity(&self) -> Option<NonZeroUsize> {
        NonZeroUsize::new(self.cache_chunks)
    }
}

/// Configuration for the `info` subcommand.
#[derive(Args, Debug, Clone)]
pub struct InfoConfig {
    #[command(flatten)]
    pub source: SourceConfig,

    /// Print the report as JSON.
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

/// Configuration for the `read` subcommand.
///
/// Vectors are given in ijk order as comma-separated triples, e.g. `--step 4,4,4`.
#[derive(Args, Debug, Clone)]
pub struct ReadConfig {
    #[command(flatten)]
    pub source: SourceConfig,

    /// Read these scales individually instead of through the multiplexer.
    #[arg(long, env = "NGFF_SCALES", value_delimiter = ',')]
    pub scales: Option<Vec<String>>,

    /// Region origin (defaults to the middle k-slice).
    #[arg(long, value_delimiter = ',')]
    pub origin: Option<Vec<u64>>,

    /// Region size (defaults to one full k-slice).
    #[arg(long, value_delimiter = ',')]
    pub size: Option<Vec<u64>>,

    /// Sampling step (defaults to 4,4,4 multiplexed or 1,1,1 per scale).
    #[arg(long, value_delimiter = ',')]
    pub step: Option<Vec<u64>>,
}

fn triple(name: &str, values: &Option<Vec<u64>>) -> Result<Option<[u64; 3]>, String> {
    match values {
        None => Ok(None),
        Some(v) => <[u64; 3]>::try_from(v.as_slice())
            .map(Some)
            .map_err(|_| format!("--{} needs exactly 3 components, got {}", name, v.len())),
    }
}

impl ReadConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        self.source.validate()?;

        triple("origin", &self.origin)?;
        triple("size", &self.size)?;
        if let Some(step) = triple("step", &self.step)? {
            if step.contains(&0) {
                return Err("--step components must be at least 1".to_string());
            }
        }

        if let Some(ref scales) = self.scales {
            if scales.is_empty() || scales.iter().any(|s| s.is_empty()) {
                return Err("--scales must list at least one non-empty scale".to_string());
            }
        }

        Ok(())
    }

    pub fn origin(&self) -> Option<[u64; 3]> {
        triple("origin", &self.origin).ok().flatten()
    }

    pub fn size(&self) -> Option<[u64; 3]> {
        triple("size", &self.size).ok().flatten()
    }

    pub fn step(&self) -> Option<[u64; 3]> {
        triple("step", &self.step).ok().flatten()
    }
}

// =============================================================================
// Tests
// =============================================================================
