// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::context::Context;
use crate::errors::TransportError;
use crate::log_buffer::LogMessage;
use crate::metric::{MetricKind, StatSnapshot};
use crate::transport::Transport;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Record<'a> {
    Log {
        program_id: &'a str,
        #[serde(flatten)]
        log: &'a LogMessage,
        contexts: &'a [Context],
    },
    Stat {
        program_id: &'a str,
        key: &'a str,
        kind: MetricKind,
        value: i64,
        update_count: u64,
        #[serde(skip_serializing_if = "BTreeMap::is_empty")]
        stats: BTreeMap<&'static str, i64>,
        contexts: &'a [Context],
    },
}

/// Writes one JSON object per record, newline-delimited.
pub struct JsonTransport<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonTransport<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    fn write_record(writer: &mut W, record: &Record<'_>) -> Result<(), TransportError> {
        serde_json::to_writer(&mut *writer, record)?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

impl<W: Write + Send> Transport for JsonTransport<W> {
    fn name(&self) -> &str {
        "json"
    }

    fn send_logs(
        &self,
        program_id: &str,
        logs: &[LogMessage],
        contexts: &[Context],
    ) -> Result<(), TransportError> {
        let mut writer = self.writer.lock();
        for log in logs {
            Self::write_record(
                &mut writer,
                &Record::Log {
                    program_id,
                    log,
                    contexts,
                },
            )?;
        }
        writer.flush()?;
        Ok(())
    }

    fn send_stats(
        &self,
        program_id: &str,
        stats: &[StatSnapshot],
        contexts: &[Context],
    ) -> Result<(), TransportError> {
        let mut writer = self.writer.lock();
        for stat in stats {
            Self::write_record(
                &mut writer,
                &Record::Stat {
                    program_id,
                    key: stat.key.as_str(),
                    kind: stat.kind,
                    value: stat.value,
                    update_count: stat.update_count,
                    stats: stat.stats.iter().map(|(s, v)| (s.as_str(), *v)).collect(),
                    contexts,
                },
            )?;
        }
        writer.flush()?;
        Ok(())
    }

    fn shutdown(&self) -> Result<(), TransportError> {
        self.writer.lock().flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::LogLevel;
    use crate::log_buffer::LogSite;
    use crate::stats::Statistic;
    use crate::trace_id::TraceId;
    use serde_json::Value;
    use ustr::Ustr;

    fn lines(buffer: Vec<u8>) -> Vec<Value> {
        String::from_utf8(buffer)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_log_records() {
        let transport = JsonTransport::new(Vec::new());
        let log = LogMessage {
            site: LogSite::new("worker.rs", 88),
            level: LogLevel::Error,
            message: "job failed".to_string(),
            repeat: 2,
            trace_id: Some(TraceId::new(7)),
        };
        transport
            .send_logs("billing", &[log], &[Context::new("region", "eu")])
            .unwrap();

        let records = lines(transport.into_inner());
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record["type"], "log");
        assert_eq!(record["program_id"], "billing");
        assert_eq!(record["site"]["file"], "worker.rs");
        assert_eq!(record["site"]["line"], 88);
        assert_eq!(record["level"], "error");
        assert_eq!(record["repeat"], 2);
        assert_eq!(record["trace_id"], 7);
        assert_eq!(record["contexts"][0]["key"], "region");
    }

    #[test]
    fn test_stat_records() {
        let transport = JsonTransport::new(Vec::new());
        let stats = [
            StatSnapshot {
                key: Ustr::from("db.query"),
                kind: MetricKind::Timer,
                value: 30,
                update_count: 3,
                stats: vec![(Statistic::Max, 20), (Statistic::Count, 3)],
            },
            StatSnapshot {
                key: Ustr::from("requests"),
                kind: MetricKind::Counter,
                value: 9,
                update_count: 9,
                stats: Vec::new(),
            },
        ];
        transport.send_stats("billing", &stats, &[]).unwrap();

        let records = lines(transport.into_inner());
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["type"], "stat");
        assert_eq!(records[0]["kind"], "timer");
        assert_eq!(records[0]["stats"]["max"], 20);
        assert_eq!(records[0]["stats"]["count"], 3);
        assert_eq!(records[1]["key"], "requests");
        assert!(records[1].get("stats").is_none());
    }
}
