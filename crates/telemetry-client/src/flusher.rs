// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::client::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlushKind {
    Logs,
    Stats { reset: bool },
}

/// Drives periodic log and stats flushes for a [`Client`].
///
/// Flushes call transports synchronously, so each one runs on the blocking
/// pool. Cancelling the token stops the schedule and performs one last flush
/// of both kinds.
pub struct FlushScheduler {
    client: Arc<Client>,
    log_interval: Duration,
    stats_interval: Duration,
    reset_stats: bool,
    cancel_token: CancellationToken,
}

impl FlushScheduler {
    /// Intervals and reset policy come from the client's configuration.
    pub fn new(client: Arc<Client>, cancel_token: CancellationToken) -> Self {
        let config = client.config();
        Self {
            log_interval: config.log_flush_interval,
            stats_interval: config.stats_flush_interval,
            reset_stats: config.reset_stats_on_flush,
            client,
            cancel_token,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(self) {
        let mut log_interval = interval(self.log_interval);
        let mut stats_interval = interval(self.stats_interval);
        log_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        stats_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // discard first ticks, which are instantaneous
        log_interval.tick().await;
        stats_interval.tick().await;

        debug!("Flush scheduler started");
        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => break,
                _ = log_interval.tick() => self.flush(FlushKind::Logs).await,
                _ = stats_interval.tick() => {
                    self.flush(FlushKind::Stats { reset: self.reset_stats }).await
                }
            }
        }

        debug!("Flush scheduler stopping, running final flush");
        self.flush(FlushKind::Logs).await;
        self.flush(FlushKind::Stats {
            reset: self.reset_stats,
        })
        .await;
    }

    async fn flush(&self, kind: FlushKind) {
        let client = Arc::clone(&self.client);
        let result = tokio::task::spawn_blocking(move || match kind {
            FlushKind::Logs => client.flush_logs(),
            FlushKind::Stats { reset } => client.flush_stats(reset),
        })
        .await;
        if let Err(e) = result {
            error!("Scheduled {kind:?} flush failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::log_buffer::LogSite;
    use crate::transport::MemoryTransport;
    use tokio::time::{sleep, timeout};

    fn scheduled_client(reset: bool) -> (Arc<Client>, Arc<MemoryTransport>) {
        let client = Arc::new(
            Client::new(ClientConfig {
                log_flush_interval: Duration::from_millis(20),
                stats_flush_interval: Duration::from_millis(30),
                reset_stats_on_flush: reset,
                ..Default::default()
            })
            .expect("valid config"),
        );
        let transport = Arc::new(MemoryTransport::new("memory"));
        client.add_transport(transport.clone());
        (client, transport)
    }

    #[tokio::test]
    async fn test_periodic_flushes() {
        let (client, transport) = scheduled_client(false);
        let cancel_token = CancellationToken::new();
        let handle = FlushScheduler::new(Arc::clone(&client), cancel_token.clone()).spawn();

        client.info(LogSite::new("job.rs", 3), "tick");
        client.increment("jobs", 1);

        let wait = async {
            while transport.log_batches().is_empty() || transport.stats_batches().is_empty() {
                sleep(Duration::from_millis(10)).await;
            }
        };
        timeout(Duration::from_secs(2), wait)
            .await
            .expect("timed out waiting for scheduled flush");

        cancel_token.cancel();
        handle.await.expect("scheduler task failed");
        // counters persist without reset
        assert!(client.metric("jobs").is_some());
    }

    #[tokio::test]
    async fn test_cancel_runs_final_flush() {
        let (client, transport) = scheduled_client(true);
        let cancel_token = CancellationToken::new();
        let handle = FlushScheduler::new(Arc::clone(&client), cancel_token.clone()).spawn();

        client.info(LogSite::new("job.rs", 9), "pending");
        client.increment("jobs", 2);
        cancel_token.cancel();
        handle.await.expect("scheduler task failed");

        assert_eq!(transport.logs().len(), 1);
        assert_eq!(client.buffered_logs(), 0);
        assert!(client.metric("jobs").is_none());
        let flushed: i64 = transport
            .stats_batches()
            .iter()
            .flat_map(|batch| batch.stats.iter())
            .map(|stat| stat.value)
            .sum();
        assert_eq!(flushed, 2);
    }
}
