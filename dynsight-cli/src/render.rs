//! Plain-terminal rendering of a report.
//!
//! Findings are grouped by severity here; the report itself keeps them
//! in evidence order, ordering for display is this renderer's job.

use report_engine::model::TerminationStatus;
use report_engine::{Finding, Report, Severity};

pub fn terminal(report: &Report) {
    println!("==================================================================");
    println!(" dynsight run report");
    println!("==================================================================");

    if !report.header.version.is_empty() {
        println!(
            " solver    : {} {} ({})",
            report.header.version, report.header.revision, report.header.precision
        );
    }
    if !report.header.input_file.is_empty() {
        println!(" input     : {}", report.header.input_file);
    }
    if report.header.num_procs > 0 {
        println!(" processes : {}", report.header.num_procs);
    }
    if report.model.num_nodes > 0 {
        println!(
            " model     : {} nodes, {} parts, {} contacts",
            report.model.num_nodes, report.model.num_parts, report.model.num_contacts
        );
    }

    let status = match report.termination.status {
        TerminationStatus::Normal => "normal termination",
        TerminationStatus::ErrorTerminated => "ERROR TERMINATION",
        TerminationStatus::Incomplete => "incomplete (no termination banner)",
    };
    println!(" outcome   : {status}");
    if report.termination.target_time > 0.0 {
        println!(
            " sim time  : {:.4E} of {:.4E}",
            report.termination.actual_time, report.termination.target_time
        );
    }
    if report.termination.elapsed_seconds > 0.0 {
        println!(
            " elapsed   : {:.0}s over {} cycles",
            report.termination.elapsed_seconds, report.termination.total_cycles
        );
    }
    if !report.coverage.files_missing.is_empty() {
        println!(
            " missing   : {}",
            report.coverage.files_missing.join(", ")
        );
    }
    println!();

    let critical = count(report, Severity::Critical);
    let warning = count(report, Severity::Warning);
    let info = count(report, Severity::Info);
    println!(
        " findings  : {critical} critical, {warning} warning, {info} info"
    );
    println!();

    for severity in [Severity::Critical, Severity::Warning, Severity::Info] {
        for finding in report.findings.iter().filter(|f| f.severity == severity) {
            print_finding(finding);
        }
    }

    if !report.contact_rank_spread.is_empty() {
        println!("------------------------------------------------------------------");
        println!(" contact time per interface across ranks");
        for s in &report.contact_rank_spread {
            println!(
                "   interface {:>6}: min {:.1}s  max {:.1}s  mean {:.1}s  imbalance {:.0}%",
                s.interface_id, s.min_seconds, s.max_seconds, s.mean_seconds, s.imbalance_percent
            );
        }
        println!();
    }

    if !report.scaling.projections.is_empty() {
        println!("------------------------------------------------------------------");
        println!(" scaling projections (model-based, not measured)");
        for p in &report.scaling.projections {
            println!(
                "   {:>4} cores: ~{:.0}s, speedup {:.2}x, efficiency {:.0}%",
                p.target_cores, p.est_elapsed_seconds, p.est_speedup, p.est_efficiency_percent
            );
        }
    }
}

fn count(report: &Report, severity: Severity) -> usize {
    report
        .findings
        .iter()
        .filter(|f| f.severity == severity)
        .count()
}

fn print_finding(finding: &Finding) {
    let occurrences = if finding.occurrences > 1 {
        format!(" (x{})", finding.occurrences)
    } else {
        String::new()
    };
    println!(" [{}] {}{}", finding.severity, finding.title, occurrences);
    println!("     {}", finding.detail);
    if let Some(rec) = &finding.recommendation {
        println!("     -> {rec}");
    }
    println!();
}
