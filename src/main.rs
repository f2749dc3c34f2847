use std::{process, sync::Arc};

use sitemap_lastmod::{
    application::{
        error::AppError,
        jobs::{JobWorkerContext, RecomputeScheduler, RefreshSweepJobPayload, SweepOutcome},
        repos::{CatalogRepo, OptionStore, UrlBuilder},
        sitemap::{SitemapRegistry, SitemapService},
    },
    cache::{LastmodCache, ReadContext, SitemapConfig},
    config,
    infra::{
        catalog::StaticCatalog,
        jobs::InMemoryJobRunner,
        options::{InMemoryOptionStore, JsonFileOptionStore},
        telemetry,
        urls::SitemapUrlBuilder,
        worker::JobWorker,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(error.exit_code());
    }
}

fn report_application_error(error: &AppError) {
    let messages = error.messages();
    if dispatcher::has_been_set() {
        error!(error = %error, causes = ?messages, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_max_level(Level::ERROR)
        .with_writer(std::io::stderr)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, causes = ?messages, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    let app = build_application_context(&settings).await?;

    match command {
        config::Command::Serve(_) => run_serve(app).await,
        config::Command::Entries(args) => run_entries(app, args).await,
        config::Command::Sweep(args) => run_sweep(app, args).await,
    }
}

struct ApplicationContext {
    scheduler: Arc<RecomputeScheduler>,
    config: Arc<SitemapConfig>,
    registry: SitemapRegistry,
    worker: JobWorker,
}

async fn build_application_context(
    settings: &config::Settings,
) -> Result<ApplicationContext, AppError> {
    let catalog: Arc<dyn CatalogRepo> =
        Arc::new(StaticCatalog::load(&settings.catalog.path).await?);
    let store: Arc<dyn OptionStore> = match settings.store.path.as_ref() {
        Some(path) => Arc::new(JsonFileOptionStore::open(path.clone()).await?),
        None => Arc::new(InMemoryOptionStore::new()),
    };

    let runner = Arc::new(InMemoryJobRunner::new());
    let scheduler = Arc::new(RecomputeScheduler::new(runner.clone()));
    let cache = Arc::new(LastmodCache::new(store, scheduler.clone()));
    let urls: Arc<dyn UrlBuilder> =
        Arc::new(SitemapUrlBuilder::new(settings.sitemap.base_url.as_str())?);
    let config = Arc::new(SitemapConfig::from(&settings.sitemap));

    let mut registry = SitemapRegistry::new(settings.sitemap.max_index_entries);
    let mut worker = JobWorker::new(
        runner,
        settings.worker.concurrency,
        settings.worker.tick,
    );

    for provider in &settings.sitemap.providers {
        let service = Arc::new(SitemapService::new(
            &provider.object_type,
            provider.subtypes.clone(),
            catalog.clone(),
            cache.clone(),
            urls.clone(),
            config.clone(),
        )?);
        registry.add(service.clone())?;
        worker.register(JobWorkerContext::new(service, scheduler.clone()));
    }

    info!(
        target = "sitemap_lastmod::bootstrap",
        providers = registry.providers().len(),
        catalog = %settings.catalog.path.display(),
        persistent_store = settings.store.path.is_some(),
        "application context ready"
    );

    Ok(ApplicationContext {
        scheduler,
        config,
        registry,
        worker,
    })
}

async fn run_serve(app: ApplicationContext) -> Result<(), AppError> {
    for provider in app.registry.providers() {
        let object_type = provider.object_type();
        app.scheduler
            .register_refresh_sweep(object_type, app.config.refresh_interval_for(object_type))
            .await?;
    }

    app.worker
        .run_until(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(
                    target = "sitemap_lastmod::serve",
                    error = %err,
                    "failed to listen for shutdown signal; stopping"
                );
                return;
            }
            info!(target = "sitemap_lastmod::serve", "received shutdown signal");
        })
        .await;

    Ok(())
}

async fn run_entries(app: ApplicationContext, args: config::EntriesArgs) -> Result<(), AppError> {
    let entries = app
        .registry
        .list_entries(&args.object_type, ReadContext::Foreground)
        .await?;

    if args.json {
        let body = serde_json::to_string_pretty(&entries)
            .map_err(|err| AppError::unexpected(format!("failed to encode entries: {err}")))?;
        println!("{body}");
    } else {
        for entry in &entries {
            let lastmod = entry
                .lastmod
                .map(|value| value.to_string())
                .unwrap_or_default();
            println!("{}\t{lastmod}", entry.location);
        }
    }

    if !args.no_drain {
        let jobs = app.worker.drain().await;
        info!(
            target = "sitemap_lastmod::entries",
            object_type = %args.object_type,
            jobs,
            "pending recomputes drained"
        );
    }
    Ok(())
}

async fn run_sweep(app: ApplicationContext, args: config::SweepArgs) -> Result<(), AppError> {
    let provider = app.registry.require(&args.object_type)?;
    let handler = JobWorkerContext::new(provider.clone(), app.scheduler.clone());

    let report = match handler
        .on_sweep_triggered(RefreshSweepJobPayload {
            object_type: args.object_type.clone(),
        })
        .await
    {
        SweepOutcome::Completed(report) => report,
        SweepOutcome::CatalogUnavailable => {
            return Err(AppError::unexpected(format!(
                "catalog unavailable while sweeping `{}`",
                args.object_type
            )));
        }
        SweepOutcome::ForeignType => {
            return Err(AppError::unexpected(format!(
                "provider `{}` rejected its own sweep",
                args.object_type
            )));
        }
    };

    let jobs = app.worker.drain().await;
    info!(
        target = "sitemap_lastmod::sweep",
        object_type = %args.object_type,
        scheduled = report.scheduled,
        suppressed = report.suppressed,
        failed = report.failed,
        jobs,
        "sweep finished"
    );
    Ok(())
}
