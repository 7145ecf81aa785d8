mod config;
mod error;
mod routes;
mod state;

use crate::config::ServerConfig;
use crate::state::AppState;
use chrono::Utc;
use greenlight_mail::{MailStoreConfig, NatsMailStore};
use greenlight_notify::{NatsNotifier, NotificationTemplate, NotifierConfig};
use greenlight_workflow::{ApprovalEngine, NatsConfig, NatsInstanceStore};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = ServerConfig::from_env().expect("failed to load configuration");
    tracing::info!("Loaded configuration");

    // The notification template is process-wide immutable state, built once
    // here and only read afterwards.
    let template = match &config.notify.template_path {
        Some(path) => {
            NotificationTemplate::from_file(path).expect("failed to load notification template")
        }
        None => NotificationTemplate::default(),
    };

    // Open the durable substrate and the raw-message store
    let instance_store = NatsInstanceStore::new(&NatsConfig {
        url: config.nats.url.clone(),
        bucket_name: config.nats.instances_bucket.clone(),
    })
    .await
    .expect("failed to open run substrate");

    let mail_store = NatsMailStore::new(&MailStoreConfig {
        url: config.nats.url.clone(),
        bucket_name: config.nats.mail_bucket.clone(),
    })
    .await
    .expect("failed to open mail store");

    // Connect the notifier
    let notifier = NatsNotifier::connect(
        NotifierConfig {
            url: config.nats.url.clone(),
            callback_base_url: config.callback_base_url.clone(),
            topic_subject: config.notify.topic_subject.clone(),
            direct_subject: config.notify.direct_subject.clone(),
        },
        template,
    )
    .await
    .expect("failed to connect notifier");

    let engine = ApprovalEngine::new(
        Arc::new(instance_store),
        Arc::new(notifier),
        config.approval.engine_config(),
    );
    let app_state = Arc::new(AppState::new(engine, Arc::new(mail_store)));

    // Spawn the deadline sweeper: runs suspended past their deadline are
    // timed out here, since nothing else touches them again.
    let sweep_state = app_state.clone();
    let sweep_interval_secs = config.approval.sweep_interval_seconds;
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(sweep_interval_secs));
        loop {
            interval.tick().await;
            match sweep_state.engine.expire_due(Utc::now()).await {
                Ok(expired) => {
                    for instance in &expired {
                        tracing::warn!(run_id = %instance.id, "approval run timed out");
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "deadline sweep failed");
                }
            }
        }
    });

    let app = routes::router(app_state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .expect("failed to bind to address");

    tracing::info!("listening on http://{}", config.listen_addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install shutdown signal handler");
    tracing::info!("shutdown signal received");
}
