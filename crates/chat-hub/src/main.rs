//! Chat Hub
//!
//! Real-time presence, routing and call-signaling hub.
//!
//! # Startup Flow
//!
//! 1. Initialize tracing from `RUST_LOG` / `HUB_LOG_FORMAT`
//! 2. Load configuration from environment
//! 3. Initialize Prometheus metrics recorder
//! 4. Build collaborators and the hub (spawns the conference manager)
//! 5. Spawn scheduled delivery and expiry sweep tasks
//! 6. Bind the listener, mark ready, serve until a shutdown signal
//!
//! On shutdown the hub stops being ready, closes every connection with
//! 1000 and cancels the background tasks.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use chat_hub::actors::HubMetrics;
use chat_hub::auth::JwtIdentityValidator;
use chat_hub::config::Config;
use chat_hub::handlers::metrics_router;
use chat_hub::hub::{Collaborators, Hub, HubLimits};
use chat_hub::observability::{init_metrics_recorder, HealthState};
use chat_hub::repositories::{
    InMemoryMessageStore, InMemoryPresenceStore, InMemoryRoomDirectory, RoomKind,
};
use chat_hub::routes::{build_routes, AppState};
use chat_hub::services::TracingPushNotifier;
use chat_hub::tasks::{start_expiry_sweep, start_scheduled_delivery};
use common::config::{LogFormat, ObservabilityConfig, DEFAULT_LOG_FILTER};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let vars: HashMap<String, String> = std::env::vars().collect();
    let observability = ObservabilityConfig::from_vars(&vars)?;

    let filter = EnvFilter::try_new(&observability.log_filter)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json = observability.log_format == LogFormat::Json;
    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();

    info!("Starting Chat Hub");

    let config = Config::from_vars(&vars).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        hub_id = %config.hub_id,
        bind_address = %config.bind_address,
        public_room = %config.public_room,
        max_frame_bytes = config.max_frame_bytes,
        outbound_buffer = config.outbound_buffer,
        "Configuration loaded successfully"
    );

    // Must happen before any metric is recorded
    let prometheus_handle = init_metrics_recorder().map_err(|e| {
        error!(error = %e, "Failed to install Prometheus metrics recorder");
        e
    })?;

    let rooms = Arc::new(InMemoryRoomDirectory::new());
    rooms
        .create_room(
            &config.public_room,
            RoomKind::General,
            &config.hub_id,
            Vec::<String>::new(),
        )
        .await;

    let collaborators = Collaborators {
        identity: Arc::new(JwtIdentityValidator::new(
            &config.jwt_secret,
            config.jwt_clock_skew,
        )),
        rooms,
        messages: Arc::new(InMemoryMessageStore::new()),
        presence: Arc::new(InMemoryPresenceStore::new()),
        push: Arc::new(TracingPushNotifier),
    };

    let root_token = CancellationToken::new();
    let metrics = HubMetrics::new();
    let hub = Hub::new(
        collaborators,
        HubLimits::from_config(&config),
        Arc::clone(&metrics),
        root_token.child_token(),
    );
    let health = Arc::new(HealthState::new(metrics));

    tokio::spawn(start_scheduled_delivery(
        hub.clone(),
        config.sweep_interval,
        root_token.child_token(),
    ));
    tokio::spawn(start_expiry_sweep(
        hub.clone(),
        config.sweep_interval,
        root_token.child_token(),
    ));

    let app = build_routes(AppState {
        hub: hub.clone(),
        health: Arc::clone(&health),
    })
    .merge(metrics_router(prometheus_handle));

    let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
        error!(error = %e, addr = %config.bind_address, "Invalid bind address");
        e
    })?;

    // Bind before marking ready so a bind error fails startup
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!(error = %e, addr = %addr, "Failed to bind listener");
        e
    })?;
    health.set_ready();
    info!(addr = %addr, "Chat Hub listening");

    let shutdown_health = Arc::clone(&health);
    let shutdown_hub = hub.clone();
    let shutdown_token = root_token.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // Not ready first so load balancers stop routing new connections
            shutdown_health.set_not_ready();
            shutdown_hub.shutdown();
            shutdown_token.cancel();
        })
        .await?;

    info!("Chat Hub shutdown complete");

    Ok(())
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
