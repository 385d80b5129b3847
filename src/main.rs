use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tower_http::timeout::TimeoutLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use forgeapp_billing::adapters::gateways::{
    FlowConfig, FlowGateway, MercadoPagoConfig, MercadoPagoGateway, MockGateway,
};
use forgeapp_billing::adapters::http::{billing_router, BillingAppState};
use forgeapp_billing::adapters::memory::{
    InMemoryLedgerRepository, InMemoryPaymentEventRepository, InMemoryPaymentLinkRepository,
    InMemorySubscriptionRepository, InProcessSubscriptionLocker,
};
use forgeapp_billing::adapters::postgres::{
    self, PgAdvisoryLocker, PostgresLedgerRepository, PostgresPaymentEventRepository,
    PostgresPaymentLinkRepository, PostgresSubscriptionRepository,
};
use forgeapp_billing::adapters::{
    JobScheduler, JobSchedulerConfig, LoggingReceiptNotifier, SystemClock,
};
use forgeapp_billing::application::{BillingServices, ReconcilerPorts, ReconcilerSettings};
use forgeapp_billing::config::{AppConfig, LogFormat};
use forgeapp_billing::domain::reconciliation::Gateway;
use forgeapp_billing::ports::{Clock, PaymentGateways};

type BoxError = Box<dyn Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = AppConfig::load()?;
    init_tracing(&config);
    config.validate()?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let ports = build_ports(&config, clock.clone()).await?;
    let settings = ReconcilerSettings {
        currency: config.billing.currency.clone(),
        payment_link_ttl_days: config.billing.payment_link_ttl_days,
        default_gateway: config.billing.default_gateway()?,
        return_url: config.payment.return_url(),
        mercadopago_notify_url: config.payment.mercadopago_notify_url(),
        flow_notify_url: config.payment.flow_notify_url(),
    };
    let services = BillingServices::wire(ports, settings, config.billing.grace_period_days);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = JobScheduler::new(
        services.jobs.clone(),
        clock,
        JobSchedulerConfig::default()
            .with_interval(config.billing.scheduler_interval())
            .with_payment_links(config.billing.generate_payment_links),
    );
    let scheduler_handle = tokio::spawn(async move { scheduler.run(shutdown_rx).await });

    let mut state = BillingAppState::new(services.reconciler.clone());
    if let Some(secret) = config
        .payment
        .mercadopago_webhook_secret
        .as_deref()
        .filter(|s| !s.trim().is_empty())
    {
        state = state.with_mercadopago_secret(secret);
    } else {
        tracing::warn!("Mercado Pago webhook secret not set; signatures are not verified");
    }

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, environment = ?config.server.environment, "ForgeApp billing listening");

    let app = billing_router(state).layer(TimeoutLayer::new(Duration::from_secs(
        config.server.request_timeout_secs,
    )));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    if let Err(e) = scheduler_handle.await {
        tracing::error!(error = %e, "Job scheduler task failed");
    }
    tracing::info!("Shutdown complete");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.server.log_level));
    let registry = tracing_subscriber::registry().with(env_filter);

    match config.server.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().flatten_event(true))
            .init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn build_ports(config: &AppConfig, clock: Arc<dyn Clock>) -> Result<ReconcilerPorts, BoxError> {
    let gateways = build_gateways(config)?;
    let notifier = Arc::new(LoggingReceiptNotifier);

    if config.database.is_configured() {
        let db = &config.database;
        let pool = postgres::connect(
            &db.url,
            db.max_connections,
            db.acquire_timeout(),
            db.run_migrations,
        )
        .await?;
        let locker =
            PgAdvisoryLocker::connect(&db.url, db.lock_max_connections, db.acquire_timeout())
                .await?;

        return Ok(ReconcilerPorts {
            links: Arc::new(PostgresPaymentLinkRepository::new(pool.clone())),
            subscriptions: Arc::new(PostgresSubscriptionRepository::new(pool.clone())),
            events: Arc::new(PostgresPaymentEventRepository::new(pool.clone())),
            book: Arc::new(PostgresLedgerRepository::new(pool)),
            locker: Arc::new(locker),
            gateways,
            notifier,
            clock,
        });
    }

    tracing::warn!("No database configured; using in-memory storage");
    let events = InMemoryPaymentEventRepository::new();
    Ok(ReconcilerPorts {
        links: Arc::new(InMemoryPaymentLinkRepository::new()),
        subscriptions: Arc::new(InMemorySubscriptionRepository::with_events(events.clone())),
        events: Arc::new(events),
        book: Arc::new(InMemoryLedgerRepository::new()),
        locker: Arc::new(InProcessSubscriptionLocker::new()),
        gateways,
        notifier,
        clock,
    })
}

fn build_gateways(config: &AppConfig) -> Result<PaymentGateways, BoxError> {
    let payment = &config.payment;
    let timeout = config.billing.gateway_timeout();
    let mut gateways = PaymentGateways::new();

    match payment.mercadopago_access_token.as_deref() {
        Some(token) if payment.mercadopago_enabled() => {
            let mp = MercadoPagoConfig::new(token)
                .with_timeout(timeout)
                .with_sandbox(payment.mercadopago_sandbox);
            gateways = gateways.with(Arc::new(MercadoPagoGateway::new(mp)?));
        }
        _ if !config.is_production() => {
            tracing::warn!("Mercado Pago credentials missing; using mock gateway");
            gateways = gateways.with(Arc::new(MockGateway::new(Gateway::MercadoPago)));
        }
        _ => {}
    }

    match (payment.flow_api_key.as_deref(), payment.flow_secret_key.as_deref()) {
        (Some(key), Some(secret)) if payment.flow_enabled() => {
            let mut flow = FlowConfig::new(key, secret)
                .with_base_url(payment.flow_api_url.clone())
                .with_timeout(timeout);
            if let Some(email) = payment.flow_fallback_email.as_deref() {
                flow = flow.with_fallback_email(email);
            }
            gateways = gateways.with(Arc::new(FlowGateway::new(flow)?));
        }
        _ if !config.is_production() => {
            tracing::warn!("Flow credentials missing; using mock gateway");
            gateways = gateways.with(Arc::new(MockGateway::new(Gateway::Flow)));
        }
        _ => {}
    }

    Ok(gateways)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
