//! Batch runner: concurrent fan-out of the check battery.
//!
//! Two fan-out modes share one execution path: provider fan-out (one unit
//! per provider configuration) and key fan-out (one unit per API key against
//! a fixed endpoint). Units are fully independent: each runs in its own
//! spawned task so a panic, timeout or bad configuration in one cannot
//! abort or corrupt its siblings.
//!
//! Concurrency is a bounded worker pool (`buffer_unordered`), not a task per
//! unit: large batches must not stampede the target API or the local socket
//! table. Completion order is unconstrained; results are re-sorted by input
//! index before returning, so output order always equals input order.
//!
//! Cancellation semantics: when the token fires, units that have not been
//! dispatched yet are *omitted from the output*; units already in flight run
//! to their own completion (bounded by per-operation timeouts) and appear
//! normally. Results that are returned are always complete aggregates.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::check::{
    now_string, CheckConfig, CheckItem, CheckResult, CheckStatus, Checker, FullCheckResult,
};
use crate::protocol::ProtocolKind;

/// Default worker-pool bound, independent of batch size.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Shared endpoint identity for key fan-out: everything but the key.
#[derive(Debug, Clone)]
pub struct KeyBatchConfig {
    pub provider_id: String,
    pub provider_name: String,
    pub base_url: String,
    pub model: String,
    pub protocol: ProtocolKind,
}

pub struct BatchRunner {
    checker: Arc<Checker>,
    concurrency: usize,
}

impl BatchRunner {
    pub fn new(checker: Checker) -> Self {
        Self {
            checker: Arc::new(checker),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Provider fan-out: one battery per configuration.
    pub async fn run_batch_check(
        &self,
        units: Vec<CheckConfig>,
        cancel: &CancellationToken,
    ) -> Vec<FullCheckResult> {
        self.run_units(units, cancel).await
    }

    /// Key fan-out: one battery per API key against a fixed endpoint.
    ///
    /// `provider_id` repeats across units, so each unit's `provider_name`
    /// gets a masked-key suffix; that is the identifier callers use to map
    /// results back to keys (output order equals key order as well).
    pub async fn run_batch_key_check(
        &self,
        base: KeyBatchConfig,
        api_keys: Vec<String>,
        cancel: &CancellationToken,
    ) -> Vec<FullCheckResult> {
        let units = api_keys
            .into_iter()
            .map(|api_key| CheckConfig {
                provider_id: base.provider_id.clone(),
                provider_name: format!("{} ({})", base.provider_name, mask_key(&api_key)),
                base_url: base.base_url.clone(),
                api_key,
                model: base.model.clone(),
                protocol: base.protocol,
            })
            .collect();
        self.run_units(units, cancel).await
    }

    async fn run_units(
        &self,
        units: Vec<CheckConfig>,
        cancel: &CancellationToken,
    ) -> Vec<FullCheckResult> {
        if units.is_empty() {
            return Vec::new();
        }

        info!(
            units = units.len(),
            concurrency = self.concurrency,
            "Starting batch check"
        );

        let checker = &self.checker;
        let mut indexed: Vec<(usize, FullCheckResult)> =
            stream::iter(units.into_iter().enumerate())
                .map(|(idx, config)| {
                    let checker = Arc::clone(checker);
                    let cancel = cancel.clone();
                    async move {
                        if cancel.is_cancelled() {
                            warn!(unit = idx, provider = %config.provider_id, "Cancelled before dispatch, unit omitted");
                            return None;
                        }

                        let identity = UnitIdentity::of(&config);
                        let handle =
                            tokio::spawn(async move { checker.run_check(&config).await });
                        let result = match handle.await {
                            Ok(Ok(result)) => result,
                            Ok(Err(err)) => {
                                warn!(unit = idx, error = %err, "Unit rejected by configuration check");
                                identity.failure(format!("invalid configuration: {err}"))
                            }
                            Err(join_err) => {
                                warn!(unit = idx, error = %join_err, "Unit aborted unexpectedly");
                                identity.failure(format!("check aborted: {join_err}"))
                            }
                        };
                        Some((idx, result))
                    }
                })
                .buffer_unordered(self.concurrency)
                .filter_map(|slot| async move { slot })
                .collect()
                .await;

        indexed.sort_by_key(|(idx, _)| *idx);
        indexed.into_iter().map(|(_, result)| result).collect()
    }
}

/// Identity fields captured before a unit is handed to its task, so a fault
/// can still be attributed to the right provider in a synthetic result.
struct UnitIdentity {
    provider_id: String,
    provider_name: String,
    base_url: String,
    model: String,
    protocol: ProtocolKind,
}

impl UnitIdentity {
    fn of(config: &CheckConfig) -> Self {
        Self {
            provider_id: config.provider_id.clone(),
            provider_name: config.provider_name.clone(),
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            protocol: config.protocol,
        }
    }

    fn failure(self, message: String) -> FullCheckResult {
        let mut item = CheckResult::begin(CheckItem::Connectivity);
        item.status = CheckStatus::Failed;
        item.message = message;

        let stamp = now_string();
        FullCheckResult {
            provider_id: self.provider_id,
            provider_name: self.provider_name,
            base_url: self.base_url,
            model: self.model,
            protocol: self.protocol,
            results: vec![item],
            model_list: Vec::new(),
            start_time: stamp.clone(),
            end_time: stamp,
            total_latency_ms: 0,
        }
    }
}

/// Mask an API key for display: first 3 and last 4 characters.
pub fn mask_key(key: &str) -> String {
    if key.len() <= 8 {
        return "***".into();
    }
    format!("{}...{}", &key[..3], &key[key.len() - 4..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_key() {
        assert_eq!(mask_key("sk-abcdefgh1234"), "sk-...1234");
        assert_eq!(mask_key("short"), "***");
        assert_eq!(mask_key(""), "***");
    }

    #[test]
    fn test_concurrency_floor() {
        let runner = BatchRunner::new(Checker::new()).with_concurrency(0);
        assert_eq!(runner.concurrency, 1);
    }

    #[tokio::test]
    async fn test_empty_input_yields_empty_output() {
        let runner = BatchRunner::new(Checker::new());
        let cancel = CancellationToken::new();
        let results = runner.run_batch_check(Vec::new(), &cancel).await;
        assert!(results.is_empty());

        let base = KeyBatchConfig {
            provider_id: "p".into(),
            provider_name: "P".into(),
            base_url: "https://example.com/v1".into(),
            model: "m".into(),
            protocol: ProtocolKind::Openai,
        };
        let results = runner
            .run_batch_key_check(base, Vec::new(), &cancel)
            .await;
        assert!(results.is_empty());
    }
}
