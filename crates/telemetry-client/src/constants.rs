// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Number of distinct call sites the log buffer holds before it is flushed.
pub const MAX_BUFFERED_LOGS: usize = 10;

/// A site repeating this many times forces a log flush, so one hot call site
/// cannot hold back every other buffered message.
pub const REPEAT_FLUSH_INTERVAL: u64 = 999;

/// Default number of observations a timer keeps for percentile extraction.
pub const DEFAULT_RESERVOIR_CAPACITY: usize = 1028;

/// Used when the program id can't be resolved from the running executable.
pub const UNKNOWN_PROGRAM_ID: &str = "unknown";

pub const DEFAULT_LOG_FLUSH_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_STATS_FLUSH_INTERVAL_SECS: u64 = 10;
