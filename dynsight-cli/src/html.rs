//! Self-contained HTML rendering of a report. No external assets; the
//! stylesheet is inlined so the file works offline.

use report_engine::model::TerminationStatus;
use report_engine::{Report, Severity};

const STYLE: &str = "\
body{font-family:sans-serif;margin:2em;max-width:70em}\
h1{border-bottom:2px solid #333}\
table{border-collapse:collapse;margin:1em 0}\
td,th{border:1px solid #999;padding:0.3em 0.7em;text-align:left}\
.critical{color:#fff;background:#c0392b}\
.warning{background:#f39c12}\
.info{background:#d6eaf8}\
.rec{color:#555;font-size:0.9em}";

pub fn render(report: &Report) -> String {
    let mut out = String::with_capacity(16 * 1024);
    out.push_str("<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\">");
    out.push_str("<title>dynsight run report</title>");
    out.push_str(&format!("<style>{STYLE}</style></head><body>"));
    out.push_str("<h1>dynsight run report</h1>");

    out.push_str("<table>");
    if !report.header.version.is_empty() {
        row(
            &mut out,
            "Solver",
            &format!("{} {}", report.header.version, report.header.revision),
        );
    }
    if !report.header.input_file.is_empty() {
        row(&mut out, "Input", &report.header.input_file);
    }
    let status = match report.termination.status {
        TerminationStatus::Normal => "Normal termination",
        TerminationStatus::ErrorTerminated => "Error termination",
        TerminationStatus::Incomplete => "Incomplete",
    };
    row(&mut out, "Outcome", status);
    if report.model.num_nodes > 0 {
        row(&mut out, "Nodes", &report.model.num_nodes.to_string());
        row(&mut out, "Parts", &report.model.num_parts.to_string());
    }
    if !report.coverage.files_missing.is_empty() {
        row(
            &mut out,
            "Missing inputs",
            &report.coverage.files_missing.join(", "),
        );
    }
    out.push_str("</table>");

    out.push_str("<h2>Findings</h2><table>");
    out.push_str("<tr><th>Severity</th><th>Finding</th><th>Detail</th></tr>");
    for severity in [Severity::Critical, Severity::Warning, Severity::Info] {
        for finding in report.findings.iter().filter(|f| f.severity == severity) {
            let class = match severity {
                Severity::Critical => "critical",
                Severity::Warning => "warning",
                Severity::Info => "info",
            };
            out.push_str(&format!(
                "<tr><td class=\"{class}\">{severity}</td><td>{}</td><td>{}",
                escape(&finding.title),
                escape(&finding.detail),
            ));
            if let Some(rec) = &finding.recommendation {
                out.push_str(&format!("<div class=\"rec\">{}</div>", escape(rec)));
            }
            out.push_str("</td></tr>");
        }
    }
    out.push_str("</table>");

    if !report.contact_rank_spread.is_empty() {
        out.push_str("<h2>Contact time per interface across ranks</h2><table>");
        out.push_str(
            "<tr><th>Interface</th><th>Min</th><th>Max</th><th>Mean</th><th>Imbalance</th></tr>",
        );
        for s in &report.contact_rank_spread {
            out.push_str(&format!(
                "<tr><td>{}</td><td>{:.1}s</td><td>{:.1}s</td><td>{:.1}s</td><td>{:.0}%</td></tr>",
                s.interface_id, s.min_seconds, s.max_seconds, s.mean_seconds, s.imbalance_percent
            ));
        }
        out.push_str("</table>");
    }

    if !report.scaling.projections.is_empty() {
        out.push_str("<h2>Scaling projections (model-based)</h2><table>");
        out.push_str(
            "<tr><th>Cores</th><th>Est. elapsed</th><th>Speedup</th><th>Efficiency</th></tr>",
        );
        for p in &report.scaling.projections {
            out.push_str(&format!(
                "<tr><td>{}</td><td>{:.0}s</td><td>{:.2}x</td><td>{:.0}%</td></tr>",
                p.target_cores, p.est_elapsed_seconds, p.est_speedup, p.est_efficiency_percent
            ));
        }
        out.push_str("</table>");
    }

    out.push_str("</body></html>\n");
    out
}

fn row(out: &mut String, key: &str, value: &str) {
    out.push_str(&format!(
        "<tr><th>{}</th><td>{}</td></tr>",
        escape(key),
        escape(value)
    ));
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
