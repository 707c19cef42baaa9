use std::sync::Arc;

use anyhow::Context;
use log::{info, warn};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use brainypal::api::{app_router, ApiState};
use brainypal::app::{start_background_sync, App};
use brainypal::config::Config;
use brainypal::db::Db;
use brainypal::generator::{ContentGenerator, GenerationMode};
use brainypal::remote::RemoteClient;
use brainypal::retry::RetryPolicy;
use brainypal::sync::HttpSyncSink;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env()?;
    config.log_summary();

    let db = Db::connect(&config.database_url)
        .await
        .with_context(|| format!("opening database {}", config.database_url))?;
    info!("{} cards in the local store", db.count_cards().await?);

    let remote = match config.ai_mode {
        GenerationMode::Remote => {
            let client = RemoteClient::new(config.ai_url.clone(), config.ai_key.clone(), config.ai_timeout)?;
            if !client.has_credential() {
                warn!("BRAINYPAL_AI_KEY is not set, generation will use local templates");
            }
            Some(client)
        }
        GenerationMode::Offline => None,
    };
    let cache_ttl = chrono::Duration::from_std(config.cache_ttl).context("cache ttl out of range")?;
    let generator = ContentGenerator::new(config.ai_mode, remote, cache_ttl);

    let mut app = App::new(db.clone(), generator, config.plan);
    let sink = match &config.sync_url {
        Some(url) => {
            app = app.with_sync(RetryPolicy {
                max_attempts: config.sync_max_attempts.max(1),
                ..RetryPolicy::default()
            });
            Some(HttpSyncSink::new(url.clone(), config.ai_timeout)?)
        }
        None => None,
    };
    let app = Arc::new(Mutex::new(app));

    let sync_task = match sink {
        Some(sink) => {
            info!("syncing every {:?}", config.sync_interval);
            Some(start_background_sync(app.clone(), Arc::new(sink), config.sync_interval).await?)
        }
        None => {
            info!("no sync endpoint configured, changes stay local");
            None
        }
    };

    let router = app_router(ApiState { app });
    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    info!("listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(task) = sync_task {
        task.abort();
    }
    db.close().await;
    info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
