use billcycle::config::AppConfig;
use billcycle::engine::subscription::{spawn_subscriptions, GenerationSubscription, ReactiveSubscription};
use billcycle::error::AppError;
use billcycle::{bootstrap, commands, logging};

fn main() {
    // Initialize Sentry before anything else so panics during startup are captured.
    // Returns a no-op guard when SENTRY_DSN is absent.
    let _sentry_guard = sentry::init(logging::sentry_options());

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("billcycle: {e}");
            std::process::exit(2);
        }
    };
    if let Err(e) = std::fs::create_dir_all(&config.data_dir) {
        eprintln!("billcycle: cannot create {}: {e}", config.data_dir.display());
        std::process::exit(2);
    }
    let _log_guard = logging::init(&config.data_dir);

    tracing::info!("Starting billcycle v{}", env!("CARGO_PKG_VERSION"));

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to start async runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(config)) {
        tracing::error!("billcycle exited with error: {}", e);
        std::process::exit(1);
    }
}

async fn run(config: AppConfig) -> Result<(), AppError> {
    let state = bootstrap(config)?;
    tracing::info!(
        calendar_sync = state.calendar.is_enabled(),
        horizon_days = state.config.generation.horizon_days,
        "billcycle ready"
    );
    state.scheduler.start();

    match commands::bills::run_generation(&state, None).await {
        Ok(report) if report.failed_count() > 0 => {
            tracing::warn!(failed = report.failed_count(), "Start-up generation had failures");
        }
        Ok(_) => {}
        Err(e) => tracing::error!("Start-up generation failed: {}", e),
    }

    let subscriptions: Vec<Box<dyn ReactiveSubscription>> =
        vec![Box::new(GenerationSubscription {
            state: state.clone(),
        })];
    let _handles = spawn_subscriptions(subscriptions, state.scheduler.clone());

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");
    state.scheduler.stop();

    let stats = state.scheduler.stats();
    tracing::info!(
        runs = stats.runs_completed,
        generated = stats.instances_generated,
        failures = stats.template_failures,
        "billcycle stopped"
    );
    Ok(())
}
