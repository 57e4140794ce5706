//! Report generation over completed check results.
//!
//! The JSON report is the export format handed to the shell's file dialog;
//! the text summary is for terminals and logs.

use serde::{Deserialize, Serialize};

use super::{now_string, CheckStatus, FullCheckResult};

/// Exportable report: all results plus a rollup summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    #[serde(rename = "generatedAt")]
    pub generated_at: String,
    pub results: Vec<FullCheckResult>,
    pub summary: ReportSummary,
}

/// Per-provider rollup counts. A provider with any failed item counts as
/// failed; otherwise any warning item makes it warning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub warning: usize,
}

pub fn summarize(results: &[FullCheckResult]) -> ReportSummary {
    let mut summary = ReportSummary {
        total: results.len(),
        ..ReportSummary::default()
    };
    for result in results {
        let has_failed = result
            .results
            .iter()
            .any(|r| r.status == CheckStatus::Failed);
        let has_warning = result
            .results
            .iter()
            .any(|r| r.status == CheckStatus::Warning);
        if has_failed {
            summary.failed += 1;
        } else if has_warning {
            summary.warning += 1;
        } else {
            summary.success += 1;
        }
    }
    summary
}

/// Render the JSON report.
pub fn generate_report(results: &[FullCheckResult]) -> String {
    let report = Report {
        generated_at: now_string(),
        results: results.to_vec(),
        summary: summarize(results),
    };
    serde_json::to_string_pretty(&report).unwrap_or_else(|_| "{}".into())
}

/// Render a human-readable summary table.
pub fn text_summary(results: &[FullCheckResult]) -> String {
    let mut out = String::new();
    out.push_str("=== API Check Report ===\n");
    out.push_str(&format!("Time: {}\n\n", now_string()));

    for result in results {
        out.push_str(&format!(
            "[{}] {} ({})\n",
            result.provider_name, result.model, result.base_url
        ));
        for item in &result.results {
            let icon = match item.status {
                CheckStatus::Success => "OK",
                CheckStatus::Failed => "FAIL",
                CheckStatus::Warning => "WARN",
                CheckStatus::Pending | CheckStatus::Running => "?",
            };
            out.push_str(&format!(
                "  {:<15} [{}] {} ({}ms)\n",
                item.item, icon, item.message, item.latency_ms
            ));
        }
        out.push_str(&format!("  Total: {}ms\n\n", result.total_latency_ms));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::{CheckItem, CheckResult};
    use crate::protocol::ProtocolKind;

    fn result_with(statuses: &[CheckStatus]) -> FullCheckResult {
        let results = statuses
            .iter()
            .map(|&status| {
                let mut r = CheckResult::begin(CheckItem::Chat);
                r.status = status;
                r
            })
            .collect();
        FullCheckResult {
            provider_id: "p".into(),
            provider_name: "Provider".into(),
            base_url: "https://example.com/v1".into(),
            model: "m".into(),
            protocol: ProtocolKind::Openai,
            results,
            model_list: Vec::new(),
            start_time: String::new(),
            end_time: String::new(),
            total_latency_ms: 12,
        }
    }

    #[test]
    fn test_summarize_rollup() {
        let results = vec![
            result_with(&[CheckStatus::Success, CheckStatus::Success]),
            result_with(&[CheckStatus::Success, CheckStatus::Warning]),
            result_with(&[CheckStatus::Warning, CheckStatus::Failed]),
        ];
        let summary = summarize(&results);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.success, 1);
        assert_eq!(summary.warning, 1);
        assert_eq!(summary.failed, 1);
    }

    #[test]
    fn test_generate_report_is_valid_json() {
        let results = vec![result_with(&[CheckStatus::Success])];
        let report = generate_report(&results);
        let parsed: serde_json::Value = serde_json::from_str(&report).unwrap();
        assert_eq!(parsed["summary"]["total"], 1);
    }

    #[test]
    fn test_text_summary_mentions_provider_and_status() {
        let results = vec![result_with(&[CheckStatus::Failed])];
        let text = text_summary(&results);
        assert!(text.contains("[Provider]"));
        assert!(text.contains("[FAIL]"));
        assert!(text.contains("Total: 12ms"));
    }
}
