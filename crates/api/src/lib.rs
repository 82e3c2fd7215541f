//! HTTP API server for post-payment orchestration.
//!
//! Exposes the inbound payment and approval signals as REST endpoints, with
//! structured logging (tracing) and Prometheus metrics.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use orchestrator::{
    AccessProvisioner, ApprovalController, CheckoutService, CoachingScheduler, CrmClient,
    DEFAULT_CLAIM_TTL, FunnelDispatcher, FunnelServices, InMemoryAccessProvisioner, InMemoryCoachingScheduler,
    InMemoryCrmClient, InMemoryNotifier, InMemoryPaymentProcessor, IntentAccessor,
    NotificationFacade, Notifier, NotifyConfig, PaymentProcessor, SplitPaymentWorkflow,
};
use state_store::{ApprovalStore, IdempotencyStore, InMemoryStateStore};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use auth::AccessPolicy;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub dispatcher: FunnelDispatcher,
    pub checkout: CheckoutService,
    pub workflow: SplitPaymentWorkflow,
    pub notifications: NotificationFacade,
    pub policy: AccessPolicy,
}

/// External systems the application talks to.
pub struct Backends {
    pub processor: Arc<dyn PaymentProcessor>,
    pub idempotency: Arc<dyn IdempotencyStore>,
    pub approvals: Arc<dyn ApprovalStore>,
    pub access: Arc<dyn AccessProvisioner>,
    pub crm: Arc<dyn CrmClient>,
    pub scheduler: Arc<dyn CoachingScheduler>,
    pub notifier: Arc<dyn Notifier>,
}

/// Tunables for wiring [`AppState`].
#[derive(Debug, Clone)]
pub struct StateOptions {
    pub processor_timeout: Duration,
    pub claim_ttl: Duration,
    pub notify: NotifyConfig,
    pub policy: AccessPolicy,
}

impl Default for StateOptions {
    fn default() -> Self {
        Self {
            processor_timeout: Duration::from_secs(5),
            claim_ttl: DEFAULT_CLAIM_TTL,
            notify: NotifyConfig::default(),
            policy: AccessPolicy::default(),
        }
    }
}

impl AppState {
    /// Wires the orchestrator over `backends`. Must be called inside a tokio runtime.
    pub fn new(backends: Backends, options: StateOptions) -> Self {
        let notifications = NotificationFacade::spawn(backends.notifier, options.notify);
        let accessor = IntentAccessor::new(backends.processor, options.processor_timeout);

        let dispatcher = FunnelDispatcher::new(
            accessor.clone(),
            FunnelServices {
                idempotency: backends.idempotency,
                claim_ttl: options.claim_ttl,
                access: backends.access,
                crm: backends.crm,
                scheduler: backends.scheduler,
                notifications: notifications.clone(),
            },
        );
        let checkout = CheckoutService::new(accessor, notifications.clone());
        let workflow = SplitPaymentWorkflow::new(
            ApprovalController::new(backends.approvals),
            notifications.clone(),
        );

        Self {
            dispatcher,
            checkout,
            workflow,
            notifications,
            policy: options.policy,
        }
    }
}

/// Handles to the in-memory backends, for inspection in tests and development.
#[derive(Clone, Default)]
pub struct InMemoryBackends {
    pub store: InMemoryStateStore,
    pub processor: InMemoryPaymentProcessor,
    pub access: InMemoryAccessProvisioner,
    pub crm: InMemoryCrmClient,
    pub scheduler: InMemoryCoachingScheduler,
    pub notifier: InMemoryNotifier,
}

impl InMemoryBackends {
    pub fn backends(&self) -> Backends {
        Backends {
            processor: Arc::new(self.processor.clone()),
            idempotency: Arc::new(self.store.clone()),
            approvals: Arc::new(self.store.clone()),
            access: Arc::new(self.access.clone()),
            crm: Arc::new(self.crm.clone()),
            scheduler: Arc::new(self.scheduler.clone()),
            notifier: Arc::new(self.notifier.clone()),
        }
    }
}

/// Creates application state backed entirely by in-memory services.
pub fn create_in_memory_state(options: StateOptions) -> (Arc<AppState>, InMemoryBackends) {
    let backends = InMemoryBackends::default();
    let state = Arc::new(AppState::new(backends.backends(), options));
    (state, backends)
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/payments/dispatch", post(routes::payments::dispatch))
        .route(
            "/payments/billing-address",
            post(routes::payments::billing_address),
        )
        .route("/payments/cart", post(routes::payments::cart))
        .route("/payments/recovery", post(routes::payments::recovery))
        .route(
            "/payments/{id}/client-secret",
            get(routes::payments::client_secret),
        )
        .route(
            "/approvals/split-payments",
            post(routes::approvals::request),
        )
        .route(
            "/approvals/split-payments/resume",
            post(routes::approvals::resume),
        )
        .route(
            "/approvals/split-payments/{id}",
            get(routes::approvals::status),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
