mod api;
mod app_state;
mod config;
mod domain;
mod errors;
mod logging;
mod routes;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::cli::Args;
use crate::domain::notification::NotificationRules;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let config = config::loader::load_config(&args).context("load configuration")?;
    let _guard = logging::init_logging(&config.log)?;

    let rules = NotificationRules::compile(&config.ntfy).context("compile notification rules")?;
    info!(
        topic = rules.topic.text(),
        topic_expression = !rules.topic.is_literal(),
        tags = rules.tags.len(),
        actions = rules.actions.len(),
        "compiled notification rules"
    );
    let state = app_state::build_app_state(&config, Arc::new(rules)).context("build relay client")?;

    if state.hook_auth.is_none() {
        warn!("basic auth is disabled, the webhook endpoint accepts any caller");
    }

    let addr = config.http.listen_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    info!(
        %addr,
        relay = %config.ntfy.baseurl,
        asynchronous = config.ntfy.asynchronous,
        "listening for alertmanager webhooks"
    );

    axum::serve(listener, routes::app_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serve http")?;

    info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
