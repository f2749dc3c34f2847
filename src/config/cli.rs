use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the sitemap-lastmod binary.
#[derive(Debug, Parser)]
#[command(
    name = "sitemap-lastmod",
    version,
    about = "Sitemap lastmod cache and recompute worker"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "SITEMAPS_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Register refresh sweeps and run the job worker until interrupted.
    Serve(Box<ServeArgs>),
    /// Print the sitemap entries of one provider.
    Entries(EntriesArgs),
    /// Run a full lastmod refresh for one provider.
    Sweep(SweepArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: SharedOverrides,

    /// Override the worker tick in milliseconds.
    #[arg(long = "worker-tick-ms", value_name = "MILLIS")]
    pub worker_tick_ms: Option<u64>,

    /// Override the number of jobs run concurrently.
    #[arg(long = "worker-concurrency", value_name = "COUNT")]
    pub worker_concurrency: Option<u64>,
}

#[derive(Debug, Args, Clone)]
pub struct EntriesArgs {
    #[command(flatten)]
    pub overrides: SharedOverrides,

    /// Provider object type, e.g. `posts`.
    #[arg(value_name = "OBJECT_TYPE")]
    pub object_type: String,

    /// Print entries as a JSON array.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub json: bool,

    /// Leave recompute jobs queued instead of running them before exit.
    #[arg(long = "no-drain", action = clap::ArgAction::SetTrue)]
    pub no_drain: bool,
}

#[derive(Debug, Args, Clone)]
pub struct SweepArgs {
    #[command(flatten)]
    pub overrides: SharedOverrides,

    /// Provider object type, e.g. `posts`.
    #[arg(value_name = "OBJECT_TYPE")]
    pub object_type: String,
}

/// Flags accepted by every subcommand.
#[derive(Debug, Args, Default, Clone)]
pub struct SharedOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the catalog file.
    #[arg(long = "catalog-path", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub catalog_path: Option<PathBuf>,

    /// Override the lastmod store file.
    #[arg(long = "store-path", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub store_path: Option<PathBuf>,

    /// Override the public base URL used for sitemap locations.
    #[arg(long = "base-url", value_name = "URL")]
    pub base_url: Option<String>,

    /// Override the number of items per sitemap page.
    #[arg(long = "page-size", value_name = "COUNT")]
    pub page_size: Option<u64>,
}
