//! Application: one client, many subscriptions, JSON lines on stdout.

use crate::config::AppConfig;
use crate::error::AppResult;
use chrono::Utc;
use rtsub_core::StaticCredentials;
use rtsub_ws::{RealtimeClient, SubscriptionEvent, SubscriptionHandle};
use serde_json::{json, Value};
use std::io::Write;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, info_span, warn};

/// Main application.
pub struct Application {
    config: AppConfig,
}

impl Application {
    pub fn new(config: AppConfig) -> AppResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Run until Ctrl-C or until every subscription has ended.
    pub async fn run(self) -> AppResult<()> {
        let credentials = Arc::new(StaticCredentials::new(self.config.auth.material()?));
        let span = info_span!("rtsub", endpoint = %self.config.client.endpoint);
        let client = RealtimeClient::with_span(self.config.client.clone(), credentials, span)?;
        info!(endpoint = %client.endpoint(), "Client started");

        let (events_tx, mut events_rx) =
            mpsc::channel::<(String, SubscriptionEvent)>(self.config.client.sink_capacity);
        let mut handles: Vec<SubscriptionHandle> = Vec::new();

        for subscription in &self.config.subscriptions {
            let (handle, mut rx) = client.subscribe_channel(subscription.request()).await?;
            info!(name = %subscription.name, key = %handle.key(), "Subscription requested");
            handles.push(handle);

            let name = subscription.name.clone();
            let events_tx = events_tx.clone();
            tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    if events_tx.send((name.clone(), event)).await.is_err() {
                        break;
                    }
                }
            });
        }
        // Forwarders hold the remaining senders; the loop ends when they all finish.
        drop(events_tx);

        let mut status = client.status();
        let stdout = std::io::stdout();
        let mut event_count = 0u64;

        info!(subscriptions = handles.len(), "Entering main event loop");
        loop {
            tokio::select! {
                event = events_rx.recv() => match event {
                    Some((name, event)) => {
                        event_count += 1;
                        let line = event_line(&name, &event);
                        let mut out = stdout.lock();
                        writeln!(out, "{}", serde_json::to_string(&line)?)?;
                        out.flush()?;
                    }
                    None => {
                        info!("All subscriptions ended");
                        break;
                    }
                },

                changed = status.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let current = status.borrow_and_update().clone();
                    match &current.error {
                        Some(error) => warn!(state = %current.state, %error, "Connection status"),
                        None => info!(state = %current.state, "Connection status"),
                    }
                }

                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        info!(event_count, "Shutting down");
        for handle in &handles {
            if let Err(e) = client.unsubscribe(handle).await {
                warn!(key = %handle.key(), error = %e, "Unsubscribe failed");
            }
        }
        client.close().await?;
        Ok(())
    }
}

/// Render an event as one output line.
pub fn event_line(name: &str, event: &SubscriptionEvent) -> Value {
    let mut line = json!({
        "subscription": name,
        "received_at": Utc::now().to_rfc3339(),
    });

    let fields = match event {
        SubscriptionEvent::Started => json!({"event": "started"}),
        SubscriptionEvent::Data(payload) => json!({"event": "data", "payload": payload}),
        SubscriptionEvent::Error(error) => json!({
            "event": "error",
            "terminal": error.is_terminal(),
            "message": error.to_string(),
        }),
        SubscriptionEvent::Complete => json!({"event": "complete"}),
    };

    if let (Some(line), Value::Object(fields)) = (line.as_object_mut(), fields) {
        line.extend(fields);
    }
    line
}
