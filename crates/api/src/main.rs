//! API server entry point.

use std::sync::Arc;

use api::auth::AccessPolicy;
use api::config::{Config, LogFormat};
use api::{AppState, Backends, InMemoryBackends, StateOptions};
use orchestrator::{
    HttpPaymentProcessor, LogNotifier, Notifier, PaymentProcessor, WebhookNotifier,
};
use sqlx::postgres::PgPoolOptions;
use state_store::{ApprovalStore, IdempotencyStore, PostgresStateStore};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn build_backends(config: &Config) -> Backends {
    let dev = InMemoryBackends::default();

    let (idempotency, approvals): (Arc<dyn IdempotencyStore>, Arc<dyn ApprovalStore>) =
        match &config.database_url {
            Some(url) => {
                let pool = PgPoolOptions::new()
                    .max_connections(config.database_max_connections)
                    .connect(url)
                    .await
                    .expect("failed to connect to database");
                let store = PostgresStateStore::new(pool);
                store
                    .run_migrations()
                    .await
                    .expect("failed to run migrations");
                tracing::info!("using PostgreSQL state store");
                (Arc::new(store.clone()), Arc::new(store))
            }
            None => {
                tracing::warn!("DATABASE_URL not set, using in-memory state store");
                (Arc::new(dev.store.clone()), Arc::new(dev.store.clone()))
            }
        };

    let processor: Arc<dyn PaymentProcessor> = match &config.processor_api_key {
        Some(key) => Arc::new(
            HttpPaymentProcessor::new(
                config.processor_api_base.as_str(),
                key.as_str(),
                config.processor_timeout,
            )
            .expect("failed to build payment processor client"),
        ),
        None => {
            tracing::warn!("PROCESSOR_API_KEY not set, using in-memory payment processor");
            Arc::new(dev.processor.clone())
        }
    };

    let notifier: Arc<dyn Notifier> = match &config.notify_webhook_url {
        Some(url) => Arc::new(
            WebhookNotifier::new(url.as_str(), config.notify.send_timeout)
                .expect("failed to build notification client"),
        ),
        None => Arc::new(LogNotifier),
    };

    // Access, CRM, and scheduling integrations record locally until wired to vendors.
    Backends {
        processor,
        idempotency,
        approvals,
        access: Arc::new(dev.access.clone()),
        crm: Arc::new(dev.crm.clone()),
        scheduler: Arc::new(dev.scheduler.clone()),
        notifier,
    }
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Create backends and application state
    let backends = build_backends(&config).await;
    let options = StateOptions {
        processor_timeout: config.processor_timeout,
        claim_ttl: config.claim_ttl,
        notify: config.notify,
        policy: AccessPolicy::new(config.admin_emails.clone(), config.admin_domains.clone()),
    };
    if options.policy.is_open() {
        tracing::warn!("no operator allowlist configured, approval decisions are open");
    }
    let state = Arc::new(AppState::new(backends, options));

    // 4. Re-attach workflows to approvals left pending by a previous run
    state
        .workflow
        .resume_pending()
        .await
        .expect("failed to resume pending approvals");

    // 5. Build the application
    let app = api::create_app(state.clone(), metrics_handle);

    // 6. Start server
    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    // 7. Flush queued notifications
    state.notifications.close().await;

    tracing::info!("server shut down gracefully");
}
