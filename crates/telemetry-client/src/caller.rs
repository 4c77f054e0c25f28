// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Deriving metric keys from the calling location.
//!
//! The `*_at_caller` methods on [`crate::Client`] are `#[track_caller]`, so
//! the location handed to the resolver is the application's call site. The
//! aggregation core only ever sees the resulting string key.

use std::panic::Location;

pub trait CallerResolver: Send + Sync {
    /// Key for a metric recorded at `location`, or `None` to drop the update.
    fn resolve(&self, location: &'static Location<'static>) -> Option<String>;
}

/// `file:line`, optionally prefixed.
#[derive(Debug, Clone, Default)]
pub struct LocationResolver {
    prefix: Option<String>,
}

impl LocationResolver {
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }
}

impl CallerResolver for LocationResolver {
    fn resolve(&self, location: &'static Location<'static>) -> Option<String> {
        Some(match &self.prefix {
            Some(prefix) => format!("{}.{}:{}", prefix, location.file(), location.line()),
            None => format!("{}:{}", location.file(), location.line()),
        })
    }
}

impl<F> CallerResolver for F
where
    F: Fn(&'static Location<'static>) -> Option<String> + Send + Sync,
{
    fn resolve(&self, location: &'static Location<'static>) -> Option<String> {
        self(location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_resolver() {
        let location = Location::caller();
        let key = LocationResolver::default().resolve(location).unwrap();
        assert_eq!(key, format!("{}:{}", location.file(), location.line()));

        let key = LocationResolver::with_prefix("app").resolve(location).unwrap();
        assert!(key.starts_with("app."));
        assert!(key.contains("caller.rs"));
    }

    #[test]
    fn test_closure_resolver() {
        let resolver = |location: &'static Location<'static>| {
            (location.line() > 0).then(|| "fixed".to_string())
        };
        assert_eq!(
            resolver.resolve(Location::caller()),
            Some("fixed".to_string())
        );
    }
}
