//! Heartbeat sender state machine
//!
//! Single long-lived loop: STARTING -> (SENDING <-> WAITING) -> STOPPED.
//! Every SENDING pass performs exactly one HTTP attempt and records exactly
//! one outcome (status board update + one log line). WAITING suspends on the
//! backoff delay or the shutdown signal, whichever fires first. No failure
//! path leaves the loop; only the shutdown signal reaches STOPPED.

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::backoff::Backoff;
use crate::config::AgentConfig;
use crate::status::StatusBoard;

/// A hung socket must never stall the loop: every request is bounded.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// Network-level failure (refused, DNS, timeout). Always retried.
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    /// Server answered with a non-success status. Retried exactly like a
    /// transport failure, logged distinctly for diagnosis.
    #[error("server rejected heartbeat: HTTP {status}")]
    Rejected { status: reqwest::StatusCode },
}

#[derive(Debug, Serialize)]
struct HeartbeatPayload<'a> {
    device_name: &'a str,
    timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    mac_address: Option<&'a str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SenderState {
    Starting,
    Sending,
    Waiting(Duration),
    Stopped,
}

pub struct HeartbeatSender {
    config: AgentConfig,
    client: reqwest::Client,
    backoff: Backoff,
    board: StatusBoard,
    shutdown: watch::Receiver<bool>,
    mac_address: Option<String>,
}

impl HeartbeatSender {
    pub fn new(
        config: AgentConfig,
        board: StatusBoard,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        let backoff = Backoff::new(config.heartbeat_interval(), config.max_retries);
        let mac_address = mac_address::get_mac_address()
            .ok()
            .flatten()
            .map(|mac| mac.to_string());

        Ok(Self {
            config,
            client,
            backoff,
            board,
            shutdown,
            mac_address,
        })
    }

    pub async fn run(&mut self) {
        let mut state = SenderState::Starting;
        loop {
            state = match state {
                SenderState::Starting => {
                    info!(
                        device = %self.config.device_name,
                        server = %self.config.server_url,
                        "heartbeat sender starting"
                    );
                    SenderState::Sending
                }
                SenderState::Sending => {
                    let delay = self.attempt().await;
                    SenderState::Waiting(delay)
                }
                SenderState::Waiting(delay) => self.wait(delay).await,
                SenderState::Stopped => break,
            };
        }

        self.board.mark_stopped();
        info!("heartbeat sender stopped");
    }

    /// One send attempt. Exactly one outcome is recorded per call: one
    /// status-board update and one log line, success or failure.
    async fn attempt(&mut self) -> Duration {
        match self.send_once().await {
            Ok(server_time) => {
                self.board.record_success(Utc::now());
                debug!(
                    server_time = server_time.as_deref().unwrap_or("-"),
                    "heartbeat acknowledged"
                );
                self.backoff.on_success()
            }
            Err(err) => {
                let delay = self.backoff.on_failure();
                let failures = self.backoff.consecutive_failures();
                let exhausted = self.backoff.is_exhausted();
                self.board.record_failure(err.to_string(), failures, exhausted);

                match (&err, exhausted) {
                    (_, true) => error!(
                        error = %err,
                        failures,
                        "heartbeat failing persistently, holding at capped delay"
                    ),
                    (SendError::Rejected { status }, false) => {
                        warn!(%status, failures, "heartbeat rejected by server")
                    }
                    (SendError::Transport(e), false) => {
                        warn!(error = %e, failures, "heartbeat send failed")
                    }
                }
                delay
            }
        }
    }

    /// Returns the server clock from the ack when present, for skew
    /// diagnosis in the success log.
    async fn send_once(&self) -> Result<Option<String>, SendError> {
        let payload = HeartbeatPayload {
            device_name: &self.config.device_name,
            timestamp: Utc::now().to_rfc3339(),
            mac_address: self.mac_address.as_deref(),
        };

        let response = self
            .client
            .post(&self.config.server_url)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SendError::Rejected {
                status: response.status(),
            });
        }

        let server_time = response
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|ack| {
                ack.get("server_time")
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
            });
        Ok(server_time)
    }

    /// Suspend until the delay elapses or shutdown is signaled. The channel
    /// closing counts as shutdown too: with no operator left to signal, the
    /// loop must not run forever.
    async fn wait(&mut self, delay: Duration) -> SenderState {
        tokio::select! {
            _ = tokio::time::sleep(delay) => SenderState::Sending,
            _ = self.shutdown.changed() => SenderState::Stopped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_sender(server_url: &str, max_retries: i64) -> (HeartbeatSender, watch::Sender<bool>) {
        let config = AgentConfig {
            server_url: server_url.to_string(),
            device_name: "Test_Device".to_string(),
            heartbeat_interval_secs: 60,
            max_retries,
        };
        let (tx, rx) = watch::channel(false);
        let sender = HeartbeatSender::new(config, StatusBoard::new(), rx).unwrap();
        (sender, tx)
    }

    #[tokio::test]
    async fn wait_wakes_early_on_shutdown() {
        let (mut sender, tx) = test_sender("http://127.0.0.1:9/heartbeat", 3);
        tx.send(true).unwrap();

        // a one-hour delay must be cut short by the signal
        let next = sender.wait(Duration::from_secs(3600)).await;
        assert_eq!(next, SenderState::Stopped);
    }

    #[tokio::test]
    async fn wait_resumes_sending_after_delay() {
        let (mut sender, _tx) = test_sender("http://127.0.0.1:9/heartbeat", 3);
        let next = sender.wait(Duration::from_millis(1)).await;
        assert_eq!(next, SenderState::Sending);
    }

    #[tokio::test]
    async fn failed_attempt_records_one_outcome_and_backs_off() {
        // port 9 (discard) is closed: connection refused, no external network
        let (mut sender, _tx) = test_sender("http://127.0.0.1:9/heartbeat", 3);

        let delay = sender.attempt().await;
        assert_eq!(delay, Duration::from_secs(60)); // first failure: 60 * 2^0

        let snap = sender.board.snapshot();
        assert_eq!(snap.consecutive_failures, 1);
        assert_eq!(snap.heartbeat_count, 0);
        assert!(snap.last_error.is_some());

        let delay = sender.attempt().await;
        assert_eq!(delay, Duration::from_secs(120));
        assert_eq!(sender.board.snapshot().consecutive_failures, 2);
    }

    #[tokio::test]
    async fn exhausted_sender_keeps_scheduling_attempts() {
        let (mut sender, _tx) = test_sender("http://127.0.0.1:9/heartbeat", 2);

        sender.attempt().await;
        sender.attempt().await;
        assert_eq!(
            sender.board.snapshot().connection,
            crate::status::ConnectionState::Exhausted
        );

        // a further attempt still yields a bounded delay, never a stop
        let delay = sender.attempt().await;
        assert!(delay <= Duration::from_secs(600));
    }
}
