// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::errors::TelemetryError;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;

/// Key/value pair replayed to transports with every flush.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Context {
    pub key: String,
    pub value: String,
}

impl Context {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Contexts attached to a client, keyed by `key` with last write winning.
#[derive(Debug, Default)]
pub struct ContextSet {
    entries: RwLock<BTreeMap<String, String>>,
}

impl ContextSet {
    pub fn insert(&self, key: &str, value: &str) -> Result<(), TelemetryError> {
        if key.is_empty() {
            return Err(TelemetryError::EmptyContextKey);
        }
        self.entries.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Option<String> {
        self.entries.write().remove(key)
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Copy of the current contexts, ordered by key.
    pub fn snapshot(&self) -> Vec<Context> {
        self.entries
            .read()
            .iter()
            .map(|(key, value)| Context::new(key.as_str(), value.as_str()))
            .collect()
    }
}
