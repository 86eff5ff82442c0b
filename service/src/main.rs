use popclock_service::config::{self, SourceKind};
use popclock_service::{
    AnimatedRenderer, ClockConfig, ClockError, CountryDataSource, LogSurface, PopulationClock,
    PopulationIoSource, StaticSource,
};
use tokio::signal;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let clock_config = ClockConfig::from_env();
    tracing::info!(
        tick_interval_ms = clock_config.tick_interval.as_millis() as u64,
        rate_scale = clock_config.rate_scale,
        policy = ?clock_config.rate_policy,
        "starting popclock"
    );

    match config::source_kind() {
        SourceKind::Static => run(StaticSource::default(), clock_config).await,
        SourceKind::PopulationIo => match PopulationIoSource::from_env() {
            Ok(source) => run(source, clock_config).await,
            Err(e) => tracing::error!(error = %e, "failed to set up population.io source"),
        },
    }
}

async fn run<S: CountryDataSource>(source: S, clock_config: ClockConfig) {
    let renderer = AnimatedRenderer::new(
        LogSurface,
        clock_config.animation_duration,
        clock_config.frame_interval,
    );
    let clock = PopulationClock::new(source, renderer, clock_config);

    let mut changes = BroadcastStream::new(clock.subscribe());
    let watcher = tokio::spawn(async move {
        while let Some(result) = changes.next().await {
            match result {
                Ok(change) => tracing::debug!(
                    country = %change.country,
                    old = change.old,
                    new = change.new,
                    "population change"
                ),
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped_events = skipped, "change watcher lagged behind");
                }
            }
        }
    });

    let requested = config::startup_countries();
    for input in &requested {
        match clock.add_country(input).await {
            Ok(_) => {}
            Err(ClockError::NotFound { input, suggestions }) if !suggestions.is_empty() => {
                tracing::warn!(
                    %input,
                    suggestions = %suggestions.join(", "),
                    "not a recognized country; did you mean one of these?"
                );
            }
            Err(e) => tracing::warn!(%input, error = %e, "could not add country"),
        }
    }

    if clock.tracked_countries().await.is_empty() {
        match clock.registry().list().await {
            Ok(names) => tracing::warn!(
                available = %names.join(", "),
                "nothing tracked; set POPCLOCK_COUNTRIES to a comma-separated list"
            ),
            Err(e) => tracing::error!(error = %e, "could not load supported countries"),
        }
        watcher.abort();
        return;
    }

    shutdown_signal().await;
    clock.clear().await;
    watcher.abort();
    tracing::info!("popclock shut down");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                return;
            }
        };
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
