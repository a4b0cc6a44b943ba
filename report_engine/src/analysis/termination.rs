//! Termination verdict: did the run finish, and did it get far enough.

use crate::model::{Evidence, Finding, Severity, Termination, TerminationStatus};

const SOURCE: &str = "termination";

/// A normal stop short of this fraction of the target time still lost
/// part of the event being simulated.
const COMPLETION_FRACTION: f64 = 0.99;

pub fn analyze(termination: &Termination) -> Vec<Finding> {
    let mut findings = Vec::new();

    match termination.status {
        TerminationStatus::ErrorTerminated => {
            let detail = match &termination.error_message {
                Some(message) => format!(
                    "The solver error-terminated at t={:.4E} (target {:.4E}): {message}",
                    termination.actual_time, termination.target_time
                ),
                None => format!(
                    "The solver error-terminated at t={:.4E} (target {:.4E}).",
                    termination.actual_time, termination.target_time
                ),
            };
            findings.push(
                Finding::new(Severity::Critical, "termination", "Error termination", detail)
                    .with_recommendation(
                        "Start from the failure findings: negative volumes, NaN values, \
                         and timestep collapse are the usual causes.",
                    )
                    .with_evidence(Evidence::Time(termination.actual_time)),
            );
        }
        TerminationStatus::Incomplete => {
            findings.push(
                Finding::new(
                    Severity::Critical,
                    "termination",
                    "Run did not terminate cleanly",
                    "No termination banner was found. The run is either still going, \
                     was killed externally, or crashed without writing its summary.",
                )
                .with_recommendation(
                    "Check the job scheduler logs and the tail of the message files for \
                     the last thing the solver printed.",
                ),
            );
        }
        TerminationStatus::Normal => {
            if termination.target_time > 0.0
                && termination.actual_time < COMPLETION_FRACTION * termination.target_time
            {
                findings.push(
                    Finding::new(
                        Severity::Warning,
                        "termination",
                        "Normal termination short of target time",
                        format!(
                            "The run stopped normally at t={:.4E}, {:.1}% of the \
                             {:.4E} target. A sense switch or *TERMINATION criterion \
                             ended it early.",
                            termination.actual_time,
                            termination.actual_time / termination.target_time * 100.0,
                            termination.target_time
                        ),
                    )
                    .with_recommendation(
                        "Confirm the early stop was intended; check *TERMINATION and any \
                         sense-switch usage.",
                    )
                    .with_evidence(Evidence::Time(termination.actual_time)),
                );
            }
        }
    }

    for finding in &mut findings {
        finding.source = SOURCE.to_string();
    }
    findings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normal(actual: f64, target: f64) -> Termination {
        Termination {
            status: TerminationStatus::Normal,
            target_time: target,
            actual_time: actual,
            ..Default::default()
        }
    }

    #[test]
    fn test_termination__error_terminated__then_critical_with_message() {
        let termination = Termination {
            status: TerminationStatus::ErrorTerminated,
            target_time: 0.12,
            actual_time: 0.03,
            error_message: Some("out of range (tied) nodes".to_string()),
            ..Default::default()
        };
        let findings = analyze(&termination);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Critical);
        assert!(findings[0].detail.contains("out of range"));
    }

    #[test]
    fn test_termination__no_banner__then_critical_incomplete() {
        let findings = analyze(&Termination::default());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Critical);
        assert!(findings[0].title.contains("did not terminate"));
    }

    #[test]
    fn test_termination__normal_but_short__then_warning() {
        let findings = analyze(&normal(0.08, 0.12));
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Warning);
    }

    #[test]
    fn test_termination__normal_at_target__then_no_findings() {
        assert!(analyze(&normal(0.12, 0.12)).is_empty());
        // Within the rounding tolerance of the printed time.
        assert!(analyze(&normal(0.1195, 0.12)).is_empty());
    }
}
