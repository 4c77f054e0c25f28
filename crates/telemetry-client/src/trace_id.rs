// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use derive_more::{Display, From, Into};
use rand::Rng;
use serde::Serialize;

pub const NULL_TRACE_ID: TraceId = TraceId::NULL;

/// Correlation id attached to log messages. A non-sentinel id forces the
/// message through level filtering and buffering.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Display, From, Into, Serialize,
)]
#[display("{_0:016x}")]
#[serde(transparent)]
pub struct TraceId(u64);

impl TraceId {
    /// The "no trace" sentinel.
    pub const NULL: TraceId = TraceId(0);

    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Random id, never the sentinel.
    pub fn generate() -> Self {
        Self(rand::thread_rng().gen_range(1..=u64::MAX))
    }

    pub const fn value(self) -> u64 {
        self.0
    }

    pub const fn is_traced(self) -> bool {
        self.0 != 0
    }
}
