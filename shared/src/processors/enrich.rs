//! Resource enricher.
//!
//! Merges process-wide static attributes (service name, environment) into
//! every batch's resource. Existing keys win: enrichment never overwrites
//! what the producer reported, which also makes the processor idempotent.

use crate::models::TelemetryBatch;
use std::collections::HashMap;

/// Merges configured static attributes into batch resources,
/// first-write-wins.
#[derive(Debug, Clone)]
pub struct ResourceEnricher {
    attributes: HashMap<String, String>,
}

impl ResourceEnricher {
    /// Creates an enricher with the given static attributes.
    #[must_use]
    pub fn new(attributes: HashMap<String, String>) -> Self {
        Self { attributes }
    }

    /// Returns a new batch with the static attributes merged into the
    /// resource. Keys already present are left untouched.
    #[must_use]
    pub fn apply(&self, batch: TelemetryBatch) -> TelemetryBatch {
        let TelemetryBatch {
            kind,
            mut resource,
            records,
        } = batch;

        for (key, value) in &self.attributes {
            resource
                .attributes
                .entry(key.clone())
                .or_insert_with(|| serde_json::Value::String(value.clone()));
        }

        TelemetryBatch {
            kind,
            resource,
            records,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LogBody, LogEntry, LogLevel, Resource};

    fn enricher(pairs: &[(&str, &str)]) -> ResourceEnricher {
        ResourceEnricher::new(
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        )
    }

    fn batch_with_service(service: &str) -> TelemetryBatch {
        TelemetryBatch::logs(
            Resource::new().with_attribute("service.name", service),
            vec![LogEntry::new(LogLevel::Info, LogBody::text("x"))],
        )
    }

    #[test]
    fn test_adds_missing_attributes() {
        let enricher = enricher(&[("deployment.environment", "prod")]);

        let out = enricher.apply(batch_with_service("api"));

        assert_eq!(out.resource.get_str("deployment.environment"), Some("prod"));
        assert_eq!(out.resource.get_str("service.name"), Some("api"));
    }

    #[test]
    fn test_existing_keys_are_not_overwritten() {
        let enricher = enricher(&[("service.name", "fallback")]);

        let out = enricher.apply(batch_with_service("api"));

        assert_eq!(out.resource.get_str("service.name"), Some("api"));
    }

    #[test]
    fn test_idempotent() {
        let enricher = enricher(&[("deployment.environment", "prod"), ("region", "eu-west-1")]);

        let once = enricher.apply(batch_with_service("api"));
        let twice = enricher.apply(once.clone());

        assert_eq!(once.resource, twice.resource);
    }

    #[test]
    fn test_records_untouched() {
        let enricher = enricher(&[("env", "prod")]);

        let out = enricher.apply(batch_with_service("api"));

        assert_eq!(out.len(), 1);
    }
}
