// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Per-call-site log deduplication.

use crate::constants::REPEAT_FLUSH_INTERVAL;
use crate::level::LogLevel;
use crate::trace_id::TraceId;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use fnv::FnvBuildHasher;
use serde::Serialize;
use std::fmt;
use ustr::Ustr;

/// Where a log call was made. Two calls from the same site are merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct LogSite {
    pub file: Ustr,
    pub line: u32,
}

impl LogSite {
    pub fn new(file: &str, line: u32) -> Self {
        Self {
            file: Ustr::from(file),
            line,
        }
    }
}

impl fmt::Display for LogSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

impl From<&'static std::panic::Location<'static>> for LogSite {
    fn from(location: &'static std::panic::Location<'static>) -> Self {
        Self::new(location.file(), location.line())
    }
}

/// [`LogSite`] of the macro invocation.
#[macro_export]
macro_rules! log_site {
    () => {
        $crate::log_buffer::LogSite::new(file!(), line!())
    };
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogMessage {
    pub site: LogSite,
    pub level: LogLevel,
    pub message: String,
    pub repeat: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<TraceId>,
}

/// What happened to a message handed to [`LogBuffer::record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Stored; `buffered` is the number of distinct sites now held.
    Buffered { buffered: usize },
    /// The site hit a multiple of the repeat interval; the buffer should be
    /// flushed now.
    RepeatLimit,
}

#[derive(Debug, Default)]
pub struct LogBuffer {
    messages: DashMap<LogSite, LogMessage, FnvBuildHasher>,
}

impl LogBuffer {
    pub fn record(
        &self,
        site: LogSite,
        level: LogLevel,
        trace_id: Option<TraceId>,
        message: &str,
    ) -> RecordOutcome {
        let trace_id = trace_id.filter(|id| id.is_traced());
        {
            // the shard guard is released before `len` is read below
            match self.messages.entry(site) {
                Entry::Occupied(mut occupied) => {
                    let existing = occupied.get_mut();
                    existing.repeat += 1;
                    if trace_id.is_some() {
                        existing.trace_id = trace_id;
                    }
                    if existing.repeat % REPEAT_FLUSH_INTERVAL == 0 {
                        return RecordOutcome::RepeatLimit;
                    }
                }
                Entry::Vacant(vacant) => {
                    vacant.insert(LogMessage {
                        site,
                        level,
                        message: message.to_string(),
                        repeat: 1,
                        trace_id,
                    });
                }
            }
        }
        RecordOutcome::Buffered {
            buffered: self.messages.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn get(&self, site: &LogSite) -> Option<LogMessage> {
        self.messages.get(site).map(|m| m.value().clone())
    }

    /// Remove and return every buffered message. A concurrent `record` for a
    /// site is either drained with it or starts a new entry afterwards.
    pub fn drain(&self) -> Vec<LogMessage> {
        let sites: Vec<LogSite> = self.messages.iter().map(|entry| *entry.key()).collect();
        sites
            .into_iter()
            .filter_map(|site| self.messages.remove(&site))
            .map(|(_, message)| message)
            .collect()
    }

    pub fn clear(&self) {
        self.messages.clear();
    }
}
