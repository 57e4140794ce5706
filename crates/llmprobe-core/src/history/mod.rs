//! History sink contract.
//!
//! The engine is a one-way producer: completed aggregates are handed to a
//! sink and never read back. Storage, pagination and deletion are entirely
//! the sink's concern.

use crate::check::{CheckStatus, FullCheckResult};

/// Receives completed check results for durable storage.
pub trait HistorySink: Send + Sync {
    fn record(&self, result: &FullCheckResult) -> anyhow::Result<()>;
}

/// Sink that drops everything. Used when persistence is disabled.
pub struct NullSink;

impl HistorySink for NullSink {
    fn record(&self, _result: &FullCheckResult) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Rollup status for a stored aggregate: any failed item marks the whole run
/// failed, otherwise any warning marks it warning.
pub fn overall_status(result: &FullCheckResult) -> CheckStatus {
    let mut status = CheckStatus::Success;
    for item in &result.results {
        match item.status {
            CheckStatus::Failed => return CheckStatus::Failed,
            CheckStatus::Warning => status = CheckStatus::Warning,
            _ => {}
        }
    }
    status
}
