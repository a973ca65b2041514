use std::net::SocketAddr;

use anyhow::Context;
use sessionguard::middleware::{AuthConfig, AuthState, auth_routes};
use sessionguard::{
    AnomalyNotifier, MemorySessionStore, SessionManager, TokenConfig, TracingNotifier,
    WebhookNotifier,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| {
                    EnvFilter::try_new(std::env::var("LOG_LEVEL").as_deref().unwrap_or("info"))
                })
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let token_config = TokenConfig::from_env()?;
    let auth_config = AuthConfig::from_env()?;

    let mut store = MemorySessionStore::new(token_config.digest_key().clone());
    if let Ok(subjects) = std::env::var("KNOWN_SUBJECTS") {
        let subjects: Vec<String> = subjects
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        tracing::info!(count = subjects.len(), "Restricting logins to known subjects");
        store = store.with_known_subjects(subjects);
    }

    let notifier: Box<dyn AnomalyNotifier> = match std::env::var("ANOMALY_WEBHOOK_URL") {
        Ok(url) => {
            let url: url::Url = url.parse().context("ANOMALY_WEBHOOK_URL")?;
            tracing::info!(%url, "Reporting origin changes to webhook");
            Box::new(WebhookNotifier::new(url))
        }
        Err(_) => Box::new(TracingNotifier),
    };

    let manager = SessionManager::new(&token_config, store, notifier);
    let app = auth_routes(AuthState::new(auth_config, manager));

    let port: u16 = match std::env::var("SERVER_PORT") {
        Ok(p) => p.parse().context("SERVER_PORT")?,
        Err(_) => 8080,
    };
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("binding port {port}"))?;

    tracing::info!(port, "Listening");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
