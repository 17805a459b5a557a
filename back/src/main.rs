use std::{net::SocketAddr, time::Duration};

use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use todos_back::{
    app,
    config::{Args, BackendKind, Config},
    session::SessionRegistry,
    storage::{Backend, PgBackend, SessionBackend},
};
use tokio::time::{self, Instant};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "todos=info,todos_back=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Args::parse().into_config()?;

    info!(
        backend = ?config.backend,
        port = config.port,
        tls = config.tls.is_some(),
        "loaded configuration"
    );

    match config.backend {
        BackendKind::Session => serve(SessionBackend, &config).await,
        BackendKind::Postgres => {
            let backend = PgBackend::connect(&config.database_url, config.max_connections).await?;
            serve(backend, &config).await
        }
    }
}

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

async fn serve<B: Backend>(backend: B, config: &Config) -> eyre::Result<()> {
    let sessions = SessionRegistry::new(config.session_idle_timeout());

    tokio::spawn({
        let sessions = sessions.clone();
        async move {
            loop {
                time::sleep(SESSION_SWEEP_INTERVAL).await;
                let dropped = sessions.expire(Instant::now()).await;
                if dropped > 0 {
                    debug!(dropped, "expired idle sessions");
                }
            }
        }
    });

    let app = app(backend, sessions);
    let addr = SocketAddr::from(([0; 4], config.port));

    info!(%addr, "listening");

    match &config.tls {
        Some(tls) => {
            let rustls = RustlsConfig::from_pem_file(&tls.cert, &tls.key).await?;
            axum_server::bind_rustls(addr, rustls)
                .serve(app.into_make_service())
                .await?;
        }
        None => {
            axum_server::bind(addr)
                .serve(app.into_make_service())
                .await?;
        }
    }

    Ok(())
}
