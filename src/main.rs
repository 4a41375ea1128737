//! EVADE Alert Core - Main Entry Point
//!
//! Reads detection events as JSON lines from stdin, runs them through the
//! engine and prints every finalized history record as a JSON line.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};

use evade_alert_core::api::Commands;
use evade_alert_core::constants;
use evade_alert_core::logic::detection::DetectionEvent;
use evade_alert_core::logic::engine::run_feed;
use evade_alert_core::logic::history::{HistoryRecord, JsonlHistoryLog};
use evade_alert_core::logic::registry::InMemoryRegistry;
use evade_alert_core::logic::response::{
    WebhookContactNotifier, WebhookDispatch, WebhookEmailTransport,
};
use evade_alert_core::logic::settings::Settings;
use evade_alert_core::{Engine, EngineBuilder, EngineConfig, EngineError};

#[tokio::main]
async fn main() -> Result<(), EngineError> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("🚨 {} v{} starting", constants::APP_NAME, env!("CARGO_PKG_VERSION"));

    let config = EngineConfig::from_env();
    let engine = build_engine(config)?;

    let mut commands = Commands::new(engine.clone());
    if let Some(path) = engine.config().settings_file.clone() {
        match Settings::load(&path) {
            Ok(Some(settings)) => settings.apply(&engine)?,
            Ok(None) => log::info!("No saved settings at {:?}, using defaults", path),
            Err(e) => log::warn!("Ignoring unreadable settings {:?}: {}", path, e),
        }
        commands = commands.with_settings_file(path);
    }
    log::info!(
        "Active profile: {} (policy version {})",
        commands.get_active_profile(),
        engine.policies().version()
    );

    let printer = tokio::spawn(print_records(commands.subscribe()));

    let (tx, rx) = mpsc::channel(engine.config().event_buffer.max(1));
    let reader = tokio::spawn(read_events(tx));

    let stats = run_feed(engine.clone(), rx).await;
    if let Err(e) = reader.await {
        log::error!("Feed reader failed: {}", e);
    }

    match serde_json::to_string(&stats) {
        Ok(json) => log::info!("Feed stats: {}", json),
        Err(e) => log::warn!("Failed to serialize feed stats: {}", e),
    }

    // Dropping the last engine handle closes the record channel
    drop(commands);
    drop(engine);
    if let Err(e) = printer.await {
        log::error!("Record printer failed: {}", e);
    }
    Ok(())
}

fn build_engine(config: EngineConfig) -> Result<Engine, EngineError> {
    let registry = match &config.registry_file {
        Some(path) => InMemoryRegistry::load_from_file(path)?,
        None => {
            log::warn!("No offender registry configured, every detection will be unknown");
            InMemoryRegistry::new()
        }
    };

    let history = JsonlHistoryLog::open(config.history_dir.clone())?;
    log::info!("History log at {:?}", history.base_dir());

    let mut builder = EngineBuilder::log_only(config.clone())
        .registry(Arc::new(registry))
        .history(Arc::new(history));

    if let Some(url) = &config.email_relay_url {
        log::info!("Email relay: {}", url);
        builder = builder.email(Arc::new(WebhookEmailTransport::new(
            url,
            config.email_retry.attempt_timeout,
        )));
    }
    if let Some(url) = &config.sms_gateway_url {
        log::info!("SMS gateway: {}", url);
        builder = builder.contact_notifier(Arc::new(WebhookContactNotifier::new(
            url,
            config.contact_retry.attempt_timeout,
        )));
    }
    if let Some(url) = &config.dispatch_url {
        log::info!("Emergency dispatch: {}", url);
        builder = builder.dispatch(Arc::new(WebhookDispatch::new(
            url,
            config.call_retry.attempt_timeout,
        )));
    }

    Ok(builder.build())
}

/// One JSON detection per line; malformed lines are skipped
async fn read_events(tx: mpsc::Sender<DetectionEvent>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                log::error!("Failed to read detection feed: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<DetectionEvent>(&line) {
            Ok(event) => {
                if tx.send(event).await.is_err() {
                    break;
                }
            }
            Err(e) => log::warn!("Skipping malformed detection: {}", e),
        }
    }
}

async fn print_records(mut rx: broadcast::Receiver<HistoryRecord>) {
    loop {
        match rx.recv().await {
            Ok(record) => match serde_json::to_string(&record) {
                Ok(json) => println!("{}", json),
                Err(e) => log::warn!("Failed to serialize record {}: {}", record.id, e),
            },
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                log::warn!("Output lagged, {} record(s) not printed", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
