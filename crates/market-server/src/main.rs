//! Course marketplace HTTP server

use std::sync::Arc;

use market_core::{Clock, MemoryStore, SystemClock};
use market_payments::{ChapaClient, ExpirySweeper, PaymentGateway, WebhookVerifier};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use market_server::{build_router, seed, AppState, ServerConfig, SessionKeys};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment first so RUST_LOG from .env reaches the filter
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;

    let store = Arc::new(MemoryStore::new());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let sessions = SessionKeys::new(config.jwt_secret.as_bytes());

    // Initialize payments
    let gateway: Option<Arc<dyn PaymentGateway>> = match ChapaClient::from_env() {
        Ok(client) => {
            tracing::info!("✓ Chapa configured");
            Some(Arc::new(client))
        }
        Err(err) => {
            tracing::warn!("⚠ Chapa not configured - payments disabled ({err})");
            tracing::warn!("  Set CHAPA_SECRET_KEY in .env");
            None
        }
    };

    let webhooks = WebhookVerifier::from_env();
    if gateway.is_some() && !webhooks.requires_signature() {
        tracing::warn!("⚠ CHAPA_WEBHOOK_SECRET not set - webhook signatures are not checked");
    }

    let state = AppState::new(
        store.clone(),
        clock.clone(),
        gateway,
        config.checkout(),
        webhooks,
        sessions.clone(),
    );

    if config.seed_demo_data {
        let demo = seed::seed_demo_data(store.as_ref(), &sessions, clock.now()).await?;
        tracing::info!(course_id = %demo.course.id, "Seeded demo course");
        tracing::info!("  instructor token: {}", demo.instructor_token);
        tracing::info!("  student token:    {}", demo.student_token);
    }

    if let Some(payments) = state.payments.clone() {
        ExpirySweeper::new(payments, config.sweep_interval).spawn();
    }

    let app = build_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 course marketplace running on http://{}", config.bind_addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health                                      - Health check");
    tracing::info!("  POST /api/v1/purchase/checkout/create-checkout-session");
    tracing::info!("  GET  /api/v1/purchase/verify/{{tx_ref}}");
    tracing::info!("  POST /api/v1/purchase/webhook                     - Gateway callback");
    tracing::info!("  GET  /api/v1/course/published                     - Catalog");
    tracing::info!("");

    axum::serve(listener, app).await?;

    Ok(())
}
