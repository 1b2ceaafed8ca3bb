//! SMAM - alert subscribers for elderly monitoring wearables.
//!
//! # API Endpoints
//!
//! - `POST /queues/:name` - Publish a device message (`accelerometer`, `datetime`)
//! - `GET /queues` - Queue counters
//! - `GET /alerts/recent` - Recent alerts
//! - `GET /alerts/subject/:id` - Alerts for one subject
//! - `GET /health` - Health check

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use smam::api;
use smam::app::App;
use smam::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("smam=info".parse()?))
        .init();

    let config = Config::from_env();

    info!(
        port = config.port,
        db_url = %config.database_url,
        fall = config.run_fall,
        medication = config.run_medication,
        "Starting SMAM subscribers"
    );

    let app = App::start(&config).await?;
    let router = api::router(app.state());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;

    info!(%addr, "SMAM is listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
        })
        .await?;

    app.shutdown().await?;

    Ok(())
}
