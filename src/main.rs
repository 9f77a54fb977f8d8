use git_push_notify::api::router;
use git_push_notify::config::{NotifierConfig, load_config};
use git_push_notify::error::Result;
use git_push_notify::github::GitHubClient;
use git_push_notify::logging::setup_logging;
use git_push_notify::notifier::{NotifierSettings, PushNotifier};
use git_push_notify::notify::SnsPublisher;
use git_push_notify::AppState;
use std::sync::Arc;
use tokio::signal;
use tracing::{self, info};

async fn build_state(config: &NotifierConfig) -> Result<AppState> {
    let fetcher = GitHubClient::new(
        config.github.api_base_url.clone(),
        &config.github.user_agent,
        config.github.request_timeout,
        config.github.retry.clone(),
    )?
    .with_deadline(config.github.fetch_deadline);

    let publisher = SnsPublisher::from_env(
        config.notification.topic_arn.clone(),
        config.notification.aws_region.clone(),
    )
    .await;

    let notifier = PushNotifier::new(
        NotifierSettings::from(config),
        Arc::new(fetcher),
        Arc::new(publisher),
    );

    Ok(AppState::new(notifier, config.notification.subscribers.len()))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

async fn run(config: NotifierConfig) -> Result<()> {
    let state = Arc::new(build_state(&config).await?);
    let app = router(state);

    info!("Listening on {}", config.server.bind_address);
    info!(
        repository = %config.github.repository,
        environment = %config.notification.environment,
        topic = %config.notification.topic_arn,
        "Forwarding push notifications"
    );

    let listener = tokio::net::TcpListener::bind(config.server.bind_address.as_str()).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let config = match load_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let _log_guard = match setup_logging(&config.logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to set up logging: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(config).await {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}
