//! Warning and error classification through the knowledge base.

use std::collections::{BTreeMap, BTreeSet};

use crate::knowledge;
use crate::model::{Coverage, Evidence, Finding, Severity, WarningSummary};

const SOURCE: &str = "warnings";

pub struct WarningsAnalysis {
    pub summaries: Vec<WarningSummary>,
    pub findings: Vec<Finding>,
}

/// Classify every distinct code. Errors come first; warning codes with
/// a Critical diagnosis get individual findings, the rest one summary.
pub fn analyze(
    warning_counts: &BTreeMap<u32, u64>,
    warning_messages: &BTreeMap<u32, String>,
    warning_interfaces: &BTreeMap<u32, BTreeSet<u64>>,
    error_counts: &BTreeMap<u32, u64>,
    coverage: &Coverage,
) -> WarningsAnalysis {
    let mut summaries = Vec::new();
    let mut findings = Vec::new();

    for (&code, &count) in error_counts {
        let info = knowledge::lookup(code);
        summaries.push(WarningSummary {
            code,
            count,
            message: info.description.clone(),
            severity: Severity::Critical,
            recommendation: info.recommendation.clone(),
            affected_interfaces: Vec::new(),
        });
        let mut finding = Finding::new(
            Severity::Critical,
            "error",
            format!("Error {code}: {}", info.title),
            format!("{count} occurrence(s). {}", info.description),
        )
        .with_recommendation(info.recommendation);
        finding.occurrences = count;
        findings.push(finding);
    }

    // Warning summaries, heaviest code first.
    let mut ordered: Vec<(u32, u64)> = warning_counts.iter().map(|(&c, &n)| (c, n)).collect();
    ordered.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    for &(code, count) in &ordered {
        let info = knowledge::lookup(code);
        let interfaces: Vec<u64> = warning_interfaces
            .get(&code)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        summaries.push(WarningSummary {
            code,
            count,
            message: warning_messages
                .get(&code)
                .cloned()
                .unwrap_or_else(|| info.description.clone()),
            severity: info.severity,
            recommendation: info.recommendation.clone(),
            affected_interfaces: interfaces,
        });
    }

    // Warning codes that diagnose as Critical get their own finding.
    let mut plain_codes: Vec<(u32, u64)> = Vec::new();
    for &(code, count) in &ordered {
        let info = knowledge::lookup(code);
        if info.severity == Severity::Critical {
            let mut finding = Finding::new(
                Severity::Critical,
                "warning",
                format!("Warning {code}: {} ({count}x)", info.title),
                info.description.clone(),
            )
            .with_recommendation(info.recommendation);
            finding.occurrences = count;
            if let Some(interfaces) = warning_interfaces.get(&code) {
                for &interface_id in interfaces.iter().take(10) {
                    finding = finding.with_evidence(Evidence::Interface(interface_id));
                }
            }
            findings.push(finding);
        } else {
            plain_codes.push((code, count));
        }
    }
    if !plain_codes.is_empty() {
        let total: u64 = plain_codes.iter().map(|&(_, n)| n).sum();
        let code_summary = plain_codes
            .iter()
            .take(5)
            .map(|&(code, count)| format!("{code} ({count}x)"))
            .collect::<Vec<_>>()
            .join(", ");
        let mut finding = Finding::new(
            Severity::Warning,
            "warning",
            format!("{total} warnings across {} codes", plain_codes.len()),
            format!("Most frequent warning codes: {code_summary}."),
        )
        .with_recommendation(
            "Review the individual warning codes. Tied-contact warnings are usually \
             resolved by improving mesh compatibility between the contact surfaces.",
        );
        finding.occurrences = total;
        findings.push(finding);
    }

    let skipped = coverage.total_skipped();
    if skipped > 0 {
        let mut finding = Finding::new(
            Severity::Info,
            "coverage",
            format!("{skipped} records could not be parsed"),
            format!(
                "{skipped} malformed records were skipped across {} input files; the \
                 analysis covers everything else.",
                coverage.skipped_records.len()
            ),
        );
        finding.occurrences = skipped;
        findings.push(finding);
    }

    for finding in &mut findings {
        finding.source = SOURCE.to_string();
    }
    WarningsAnalysis { summaries, findings }
}
