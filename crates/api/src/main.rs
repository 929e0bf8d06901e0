//! API server entry point.

use std::sync::Arc;

use api::config::Config;
use api::routes::orders::AppState;
use saga::{
    AutomationDispatcher, CardIssuer, InMemoryCardIssuer, InMemoryPaymentGateway, PaymentGateway,
    PurchaseAutomation, StripeClient, StubAutomation, WebDriverBrowser,
};
use store::{
    InMemoryOrderStore, InMemoryUserStore, OrderStore, PostgresOrderStore, PostgresUserStore,
    UserStore,
};
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

/// Builds the application state from environment configuration.
///
/// Each external collaborator falls back to its in-memory double when
/// the corresponding environment variable is unset, so the server runs
/// standalone for local development.
async fn build_state(config: &Config) -> Arc<AppState> {
    let (orders, users): (Arc<dyn OrderStore>, Arc<dyn UserStore>) = match &config.database_url {
        Some(url) => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(10)
                .connect(url)
                .await
                .expect("failed to connect to database");
            let order_store = PostgresOrderStore::new(pool.clone());
            order_store
                .run_migrations()
                .await
                .expect("failed to run migrations");
            tracing::info!("using PostgreSQL stores");
            (
                Arc::new(order_store),
                Arc::new(PostgresUserStore::new(pool)),
            )
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory stores");
            (
                Arc::new(InMemoryOrderStore::new()),
                Arc::new(InMemoryUserStore::new()),
            )
        }
    };

    let (gateway, issuer): (Arc<dyn PaymentGateway>, Arc<dyn CardIssuer>) =
        match &config.stripe_secret_key {
            Some(key) => {
                let client = StripeClient::new(key.clone()).expect("invalid Stripe API base URL");
                tracing::info!("using Stripe payment gateway and card issuer");
                (Arc::new(client.clone()), Arc::new(client))
            }
            None => {
                tracing::warn!("STRIPE_SECRET_KEY not set, using in-memory payment services");
                (
                    Arc::new(InMemoryPaymentGateway::new()),
                    Arc::new(InMemoryCardIssuer::new()),
                )
            }
        };

    let automation: Arc<dyn PurchaseAutomation> = match &config.webdriver_url {
        Some(url) => {
            tracing::info!(webdriver_url = %url, "using WebDriver purchase automation");
            Arc::new(AutomationDispatcher::new(
                WebDriverBrowser::new(url.clone()),
                config.store_base_url.clone(),
            ))
        }
        None => {
            tracing::warn!("WEBDRIVER_URL not set, using stub purchase automation");
            Arc::new(StubAutomation::new())
        }
    };

    Arc::new(AppState::new(orders, users, gateway, issuer, automation))
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    let state = build_state(&config).await;
    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("server shut down gracefully");
}
