mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{
    Method,
    header::{AUTHORIZATION, CONTENT_TYPE},
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use tracemark_api::AppStateInner;
use tracemark_db::Database;
use tracemark_engine::{
    Dispatcher, Engine, Fanout, NotificationGateway, OutboxRelay, Policy, WebhookGateway,
    eligibility, outbox,
};

use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tracemark=debug,tower_http=debug".into()),
        )
        .init();

    let config = match ServerConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("FATAL: {:#}", e);
            std::process::exit(1);
        }
    };
    let policy = Policy::from_env()?;
    info!(
        "Policy: duplicate >= {}, copyright text/image/video >= {}/{}/{}, strike ceiling {}",
        policy.duplicate_threshold,
        policy.copyright_text_threshold,
        policy.copyright_image_threshold,
        policy.copyright_video_threshold,
        policy.strike_ceiling
    );

    let db = Arc::new(Database::open(&config.db_path)?);
    let engine = Engine::new(db.clone(), policy);
    let dispatcher = Dispatcher::new();

    // Outbox delivery: live subscribers, plus the webhook when configured
    let mut gateways: Vec<Arc<dyn NotificationGateway>> = vec![Arc::new(dispatcher.clone())];
    if let Some(url) = &config.webhook_url {
        gateways.push(Arc::new(WebhookGateway::new(url.clone())?));
        info!("Notification webhook: {}", url);
    }
    let relay = OutboxRelay::new(db.clone(), Arc::new(Fanout::new(gateways)));
    tokio::spawn(outbox::run_relay_loop(relay, config.outbox_interval_secs));

    tokio::spawn(eligibility::run_checkpoint_loop(
        engine.checkpoint.clone(),
        config.checkpoint_interval_secs,
    ));

    let state = Arc::new(AppStateInner {
        engine,
        dispatcher,
        jwt_secret: config.jwt_secret.clone(),
    });

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .allow_credentials(false);

    let app = tracemark_api::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Tracemark listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
