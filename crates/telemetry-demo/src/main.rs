// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::{env, io, sync::Arc};
use tokio::time::{interval, Duration};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use telemetry_client::{
    flusher::FlushScheduler,
    json_transport::JsonTransport,
    log_site,
    transport::TracingTransport,
    Client, ClientConfig, LogLevel, TraceId,
};
use tokio_util::sync::CancellationToken;

const WORK_INTERVAL: Duration = Duration::from_millis(250);

#[tokio::main]
pub async fn main() {
    let log_level = env::var("TELEMETRY_LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());

    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(&log_level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(false)
        .without_time()
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to install tracing subscriber: {e}");
    }

    debug!("Logging subsystem enabled");

    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid telemetry configuration: {e}");
            return;
        }
    };

    let client = match Client::new(config) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!("Unable to create telemetry client: {e}");
            return;
        }
    };
    client.add_transport(Arc::new(TracingTransport));
    client.add_transport(Arc::new(JsonTransport::new(io::stdout())));
    client.add_context("pid", &std::process::id().to_string());

    info!("Telemetry demo started for {}", client.program_id());

    let cancel_token = CancellationToken::new();
    let scheduler = FlushScheduler::new(Arc::clone(&client), cancel_token.clone()).spawn();

    let mut work_interval = interval(WORK_INTERVAL);
    let mut iteration: i64 = 0;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received interrupt, shutting down");
                break;
            }
            _ = work_interval.tick() => {
                iteration += 1;
                do_work(&client, iteration);
            }
        }
    }

    cancel_token.cancel();
    if let Err(e) = scheduler.await {
        error!("Flush scheduler failed: {e}");
    }
    client.shutdown();
}

fn do_work(client: &Client, iteration: i64) {
    let _timer = client.start_timer("demo.iteration");
    client.increment("demo.iterations", 1);
    client.set_gauge("demo.queue_depth", iteration % 7);
    client.timer_at_caller(iteration % 50);
    client.info(log_site!(), "work iteration completed");

    if iteration % 20 == 0 {
        client.log(
            log_site!(),
            LogLevel::Debug,
            Some(TraceId::generate()),
            &format!("traced iteration {iteration}"),
        );
    }
    if iteration % 40 == 0 {
        client.warning(log_site!(), "periodic warning");
    }
}
