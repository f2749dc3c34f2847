//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    collections::{BTreeMap, HashSet},
    num::{NonZeroU32, NonZeroUsize},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::cache::{DEFAULT_PAGE_SIZE, DEFAULT_REFRESH_INTERVAL_SECS, TypeOverrides};
use crate::domain::types::Subtypes;

mod cli;

pub use cli::{CliArgs, Command, EntriesArgs, ServeArgs, SharedOverrides, SweepArgs};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "sitemaps";
const ENV_PREFIX: &str = "SITEMAPS";
const DEFAULT_BASE_URL: &str = "http://localhost:8080/";
const DEFAULT_MAX_INDEX_ENTRIES: u64 = 50_000;
const DEFAULT_CATALOG_PATH: &str = "catalog.toml";
const DEFAULT_WORKER_TICK_MS: u64 = 1_000;
const DEFAULT_WORKER_CONCURRENCY: u64 = 4;

#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub sitemap: SitemapSettings,
    pub catalog: CatalogSettings,
    pub store: StoreSettings,
    pub worker: WorkerSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct SitemapSettings {
    pub page_size: NonZeroU32,
    pub refresh_interval: Duration,
    pub base_url: Url,
    pub max_index_entries: usize,
    pub providers: Vec<ProviderSettings>,
    pub overrides: BTreeMap<String, TypeOverrides>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSettings {
    pub object_type: String,
    pub subtypes: Subtypes,
}

#[derive(Debug, Clone)]
pub struct CatalogSettings {
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct StoreSettings {
    /// JSON file holding lastmod values; in-memory when unset.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub tick: Duration,
    pub concurrency: NonZeroUsize,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(args),
        Some(Command::Entries(args)) => raw.apply_shared_overrides(&args.overrides),
        Some(Command::Sweep(args)) => raw.apply_shared_overrides(&args.overrides),
        None => raw.apply_serve_overrides(&ServeArgs::default()),
    }

    Settings::from_raw(raw)
}

pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    sitemap: RawSitemapSettings,
    catalog: RawCatalogSettings,
    store: RawStoreSettings,
    worker: RawWorkerSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, args: &ServeArgs) {
        self.apply_shared_overrides(&args.overrides);
        if let Some(tick) = args.worker_tick_ms {
            self.worker.tick_ms = Some(tick);
        }
        if let Some(concurrency) = args.worker_concurrency {
            self.worker.concurrency = Some(concurrency);
        }
    }

    fn apply_shared_overrides(&mut self, overrides: &SharedOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(path) = overrides.catalog_path.as_ref() {
            self.catalog.path = Some(path.clone());
        }
        if let Some(path) = overrides.store_path.as_ref() {
            self.store.path = Some(path.clone());
        }
        if let Some(url) = overrides.base_url.as_ref() {
            self.sitemap.base_url = Some(url.clone());
        }
        if let Some(size) = overrides.page_size {
            self.sitemap.page_size = Some(size);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            sitemap,
            catalog,
            store,
            worker,
        } = raw;

        Ok(Self {
            logging: build_logging_settings(logging)?,
            sitemap: build_sitemap_settings(sitemap)?,
            catalog: build_catalog_settings(catalog)?,
            store: build_store_settings(store),
            worker: build_worker_settings(worker)?,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_sitemap_settings(sitemap: RawSitemapSettings) -> Result<SitemapSettings, LoadError> {
    let page_size = non_zero_u32(
        sitemap.page_size.unwrap_or(u64::from(DEFAULT_PAGE_SIZE)),
        "sitemap.page_size",
    )?;
    let refresh_interval = interval_from_secs(
        sitemap
            .refresh_interval_seconds
            .unwrap_or(DEFAULT_REFRESH_INTERVAL_SECS),
        "sitemap.refresh_interval_seconds",
    )?;
    let base_url = parse_base_url(sitemap.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL))?;

    let max_index_entries = sitemap
        .max_index_entries
        .unwrap_or(DEFAULT_MAX_INDEX_ENTRIES);
    if max_index_entries == 0 {
        return Err(LoadError::invalid(
            "sitemap.max_index_entries",
            "must be greater than zero",
        ));
    }
    let max_index_entries = usize::try_from(max_index_entries).map_err(|_| {
        LoadError::invalid(
            "sitemap.max_index_entries",
            "value exceeds supported range for usize",
        )
    })?;

    let providers = match sitemap.providers {
        Some(raw) => build_providers(raw)?,
        None => default_providers(),
    };

    let mut overrides = BTreeMap::new();
    for (object_type, raw) in sitemap.overrides {
        let page_size = raw
            .page_size
            .map(|value| non_zero_u32(value, "sitemap.overrides.page_size"))
            .transpose()?;
        let refresh_interval = raw
            .refresh_interval_seconds
            .map(|value| interval_from_secs(value, "sitemap.overrides.refresh_interval_seconds"))
            .transpose()?;
        overrides.insert(
            object_type,
            TypeOverrides {
                page_size,
                refresh_interval,
            },
        );
    }

    Ok(SitemapSettings {
        page_size,
        refresh_interval,
        base_url,
        max_index_entries,
        providers,
        overrides,
    })
}

fn build_providers(raw: Vec<RawProviderSettings>) -> Result<Vec<ProviderSettings>, LoadError> {
    if raw.is_empty() {
        return Err(LoadError::invalid(
            "sitemap.providers",
            "at least one provider is required",
        ));
    }

    let mut seen = HashSet::new();
    let mut providers = Vec::with_capacity(raw.len());
    for provider in raw {
        let object_type = provider.object_type.trim().to_string();
        if object_type.is_empty() {
            return Err(LoadError::invalid(
                "sitemap.providers.object_type",
                "must not be empty",
            ));
        }
        if !seen.insert(object_type.clone()) {
            return Err(LoadError::invalid(
                "sitemap.providers.object_type",
                format!("provider `{object_type}` is declared more than once"),
            ));
        }
        providers.push(ProviderSettings {
            object_type,
            subtypes: subtypes_from(provider.subtypes),
        });
    }
    Ok(providers)
}

fn subtypes_from(names: Vec<String>) -> Subtypes {
    match Subtypes::list(names) {
        Subtypes::SubtypeList(list) if list.is_empty() => Subtypes::NoSubtypes,
        subtypes => subtypes,
    }
}

fn default_providers() -> Vec<ProviderSettings> {
    vec![
        ProviderSettings {
            object_type: "posts".to_string(),
            subtypes: Subtypes::list(["post", "page"]),
        },
        ProviderSettings {
            object_type: "taxonomies".to_string(),
            subtypes: Subtypes::list(["category", "post_tag"]),
        },
        ProviderSettings {
            object_type: "users".to_string(),
            subtypes: Subtypes::NoSubtypes,
        },
    ]
}

fn build_catalog_settings(catalog: RawCatalogSettings) -> Result<CatalogSettings, LoadError> {
    let path = catalog
        .path
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CATALOG_PATH));
    if path.as_os_str().is_empty() {
        return Err(LoadError::invalid("catalog.path", "path must not be empty"));
    }
    Ok(CatalogSettings { path })
}

fn build_store_settings(store: RawStoreSettings) -> StoreSettings {
    StoreSettings {
        path: store.path.filter(|path| !path.as_os_str().is_empty()),
    }
}

fn build_worker_settings(worker: RawWorkerSettings) -> Result<WorkerSettings, LoadError> {
    let tick_ms = worker.tick_ms.unwrap_or(DEFAULT_WORKER_TICK_MS);
    if tick_ms == 0 {
        return Err(LoadError::invalid(
            "worker.tick_ms",
            "must be greater than zero",
        ));
    }

    let concurrency = worker.concurrency.unwrap_or(DEFAULT_WORKER_CONCURRENCY);
    let concurrency = usize::try_from(concurrency)
        .ok()
        .and_then(NonZeroUsize::new)
        .ok_or_else(|| {
            LoadError::invalid("worker.concurrency", "must be a positive integer")
        })?;

    Ok(WorkerSettings {
        tick: Duration::from_millis(tick_ms),
        concurrency,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSitemapSettings {
    page_size: Option<u64>,
    refresh_interval_seconds: Option<u64>,
    base_url: Option<String>,
    max_index_entries: Option<u64>,
    providers: Option<Vec<RawProviderSettings>>,
    overrides: BTreeMap<String, RawTypeOverrides>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawProviderSettings {
    object_type: String,
    subtypes: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawTypeOverrides {
    page_size: Option<u64>,
    refresh_interval_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCatalogSettings {
    path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawStoreSettings {
    path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawWorkerSettings {
    tick_ms: Option<u64>,
    concurrency: Option<u64>,
}

fn parse_base_url(value: &str) -> Result<Url, LoadError> {
    let url = Url::parse(value.trim())
        .map_err(|err| LoadError::invalid("sitemap.base_url", format!("invalid url: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(LoadError::invalid(
            "sitemap.base_url",
            format!("unsupported scheme `{}`", url.scheme()),
        ));
    }
    Ok(url)
}

fn interval_from_secs(value: u64, key: &'static str) -> Result<Duration, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_secs(value))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}
