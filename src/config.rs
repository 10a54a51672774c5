use crate::{
    report::layout::{ReportField, parse_report_fields},
    services::{attachment_store::DEFAULT_JPEG_QUALITY, catalog_service::DEFAULT_CATALOG_URL},
};
use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::{env, fmt::Display, path::PathBuf, str::FromStr};

const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub export_dir: PathBuf,
    pub catalog_url: String,
    pub catalog_file: Option<PathBuf>,
    pub fetch_timeout_secs: u64,
    pub jpeg_quality: u8,
    pub report_fields: Vec<ReportField>,
    pub max_upload_bytes: usize,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Fruit catalog with photo attachments and PDF reports")]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Host to bind to (overrides FRUIT_CATALOG_HOST)
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Port to bind to (overrides FRUIT_CATALOG_PORT)
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Directory holding photos and their manifest (overrides FRUIT_CATALOG_DATA_DIR)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Directory the PDF report is written to (overrides FRUIT_CATALOG_EXPORT_DIR)
    #[arg(long, global = true)]
    pub export_dir: Option<PathBuf>,

    /// Catalog endpoint (overrides FRUIT_CATALOG_URL)
    #[arg(long, global = true)]
    pub catalog_url: Option<String>,

    /// Read the catalog from a JSON file instead of the endpoint (overrides FRUIT_CATALOG_FILE)
    #[arg(long, global = true)]
    pub catalog_file: Option<PathBuf>,

    /// Catalog request timeout in seconds (overrides FRUIT_CATALOG_FETCH_TIMEOUT_SECS)
    #[arg(long, global = true)]
    pub fetch_timeout_secs: Option<u64>,

    /// JPEG quality for stored photos, 1-100 (overrides FRUIT_CATALOG_JPEG_QUALITY)
    #[arg(long, global = true)]
    pub jpeg_quality: Option<u8>,

    /// Comma-separated report fields, e.g. `name,family,calories,photo-date`
    /// (overrides FRUIT_CATALOG_REPORT_FIELDS)
    #[arg(long, global = true, value_delimiter = ',')]
    pub report_fields: Option<Vec<ReportField>>,

    /// Largest accepted upload in bytes (overrides FRUIT_CATALOG_MAX_UPLOAD_BYTES)
    #[arg(long, global = true)]
    pub max_upload_bytes: Option<usize>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Command {
    /// Serve the HTTP API (default)
    #[default]
    Serve,
    /// Load catalog and photos, write the PDF report, and exit
    Export,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and the command to run.
    pub fn from_env_and_args() -> Result<(Self, Command)> {
        // Parse CLI once
        let args = Args::parse();
        Self::resolve(args, |key| env::var(key))
    }

    /// Merge `args` over the variables visible through `lookup`, then defaults.
    pub fn resolve<F>(args: Args, lookup: F) -> Result<(Self, Command)>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        // --- Environment fallback ---
        let env_host = env_or(&lookup, "FRUIT_CATALOG_HOST")?.unwrap_or_else(|| "0.0.0.0".into());
        let env_port = env_parse::<u16, _>(&lookup, "FRUIT_CATALOG_PORT")?.unwrap_or(3000);
        let env_data_dir = env_or(&lookup, "FRUIT_CATALOG_DATA_DIR")?
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data/attachments"));
        let env_export_dir = env_or(&lookup, "FRUIT_CATALOG_EXPORT_DIR")?
            .map(PathBuf::from)
            .unwrap_or_else(env::temp_dir);
        let env_url =
            env_or(&lookup, "FRUIT_CATALOG_URL")?.unwrap_or_else(|| DEFAULT_CATALOG_URL.into());
        let env_file = env_or(&lookup, "FRUIT_CATALOG_FILE")?.map(PathBuf::from);
        let env_timeout = env_parse::<u64, _>(&lookup, "FRUIT_CATALOG_FETCH_TIMEOUT_SECS")?
            .unwrap_or(DEFAULT_FETCH_TIMEOUT_SECS);
        let env_quality =
            env_parse::<u8, _>(&lookup, "FRUIT_CATALOG_JPEG_QUALITY")?.unwrap_or(DEFAULT_JPEG_QUALITY);
        let env_fields = match env_or(&lookup, "FRUIT_CATALOG_REPORT_FIELDS")? {
            Some(value) => parse_report_fields(&value)
                .with_context(|| format!("parsing FRUIT_CATALOG_REPORT_FIELDS value `{}`", value))?,
            None => ReportField::DEFAULT.to_vec(),
        };
        let env_max_upload = env_parse::<usize, _>(&lookup, "FRUIT_CATALOG_MAX_UPLOAD_BYTES")?
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            data_dir: args.data_dir.unwrap_or(env_data_dir),
            export_dir: args.export_dir.unwrap_or(env_export_dir),
            catalog_url: args.catalog_url.unwrap_or(env_url),
            catalog_file: args.catalog_file.or(env_file),
            fetch_timeout_secs: args.fetch_timeout_secs.unwrap_or(env_timeout),
            jpeg_quality: args.jpeg_quality.unwrap_or(env_quality),
            report_fields: args.report_fields.unwrap_or(env_fields),
            max_upload_bytes: args.max_upload_bytes.unwrap_or(env_max_upload),
        };

        if !(1..=100).contains(&cfg.jpeg_quality) {
            bail!("jpeg quality must be between 1 and 100, got {}", cfg.jpeg_quality);
        }
        if cfg.report_fields.is_empty() {
            bail!("at least one report field is required");
        }

        Ok((cfg, args.command.unwrap_or_default()))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn env_or<F>(lookup: &F, key: &str) -> Result<Option<String>>
where
    F: Fn(&str) -> Result<String, env::VarError>,
{
    match lookup(key) {
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(err).with_context(|| format!("reading {}", key)),
    }
}

fn env_parse<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Result<String, env::VarError>,
{
    match env_or(lookup, key)? {
        Some(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|err| anyhow::anyhow!("parsing {} value `{}`: {}", key, value, err)),
        None => Ok(None),
    }
}
