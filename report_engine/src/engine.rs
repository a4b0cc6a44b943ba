//! Run orchestration: probe the result directory, fan the readers out
//! over rayon, then hand everything to the aggregator.

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::analysis::instability::{self, InstabilityAnalysis};
use crate::cancel::CancelToken;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::model::Coverage;
use crate::readers::bndout::BndoutReader;
use crate::readers::nodout::NodoutReader;
use crate::readers::{d3hsp, glstat, matsum, messag, profile, status};
use crate::report::{self, Report, RunData};

/// One-shot diagnostic engine for a single result directory.
pub struct Engine {
    dir: PathBuf,
    config: EngineConfig,
    cancel: CancelToken,
}

impl Engine {
    pub fn new(dir: impl Into<PathBuf>, config: EngineConfig) -> Engine {
        Engine {
            dir: dir.into(),
            config,
            cancel: CancelToken::new(),
        }
    }

    /// Clone of the token; cancel it from any thread to abort the run.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Read every recognized file, run the analyzers, and build the
    /// report. Fails before any parsing when neither the printer log
    /// nor a message log exists.
    pub fn run(&self) -> Result<Report> {
        if self.cancel.is_cancelled() {
            return Err(EngineError::Aborted);
        }
        let d3hsp_path = self.dir.join("d3hsp");
        let glstat_path = self.dir.join("glstat");
        let status_path = self.dir.join("status.out");
        let matsum_path = self.dir.join("matsum");
        let nodout_path = self.dir.join("nodout");
        let bndout_path = self.dir.join("bndout");
        let load_path = self.dir.join("load_profile.csv");
        let cont_path = self.dir.join("cont_profile.csv");
        let messag_paths = messag::discover(&self.dir, self.config.message_log_gap);

        if !d3hsp_path.is_file() && messag_paths.is_empty() {
            return Err(EngineError::MissingRequiredInputs {
                dir: self.dir.clone(),
            });
        }

        let mut coverage = Coverage::default();
        for (name, path) in [
            ("d3hsp", &d3hsp_path),
            ("glstat", &glstat_path),
            ("status.out", &status_path),
            ("matsum", &matsum_path),
            ("nodout", &nodout_path),
            ("bndout", &bndout_path),
            ("load_profile.csv", &load_path),
            ("cont_profile.csv", &cont_path),
        ] {
            if path.is_file() {
                coverage.files_found.push(name.to_string());
            } else {
                coverage.files_missing.push(name.to_string());
            }
        }
        if messag_paths.is_empty() {
            coverage.files_missing.push("messag".to_string());
        }
        for path in &messag_paths {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                coverage.files_found.push(name.to_string());
            }
        }
        debug!(
            found = coverage.files_found.len(),
            missing = coverage.files_missing.len(),
            "probed result directory"
        );

        let cancel = &self.cancel;
        let config = &self.config;

        let mut d3hsp_out: Option<Result<d3hsp::D3hspData>> = None;
        let mut glstat_out: Option<Result<glstat::GlstatData>> = None;
        let mut status_out: Option<Result<crate::model::StatusInfo>> = None;
        let mut matsum_out: Option<Result<matsum::MatsumData>> = None;
        let mut load_out: Option<Result<profile::LoadProfileData>> = None;
        let mut cont_out: Option<Result<profile::ContProfileData>> = None;
        let mut messag_out: Vec<Result<messag::MessagData>> = Vec::new();
        let mut instability_out: Option<Result<(InstabilityAnalysis, u64, u64)>> = None;

        rayon::scope(|s| {
            if d3hsp_path.is_file() {
                s.spawn(|_| d3hsp_out = Some(d3hsp::read(&d3hsp_path, cancel)));
            }
            if glstat_path.is_file() {
                s.spawn(|_| glstat_out = Some(glstat::read(&glstat_path, cancel)));
            }
            if status_path.is_file() {
                s.spawn(|_| status_out = Some(status::read(&status_path, cancel)));
            }
            if matsum_path.is_file() {
                s.spawn(|_| matsum_out = Some(matsum::read(&matsum_path, cancel)));
            }
            if load_path.is_file() {
                s.spawn(|_| load_out = Some(profile::read_load_profile(&load_path, cancel)));
            }
            if cont_path.is_file() {
                s.spawn(|_| cont_out = Some(profile::read_cont_profile(&cont_path, cancel)));
            }
            if !messag_paths.is_empty() {
                s.spawn(|_| {
                    messag_out = messag_paths
                        .iter()
                        .map(|path| messag::read(path, cancel))
                        .collect();
                });
            }
            if nodout_path.is_file() || bndout_path.is_file() {
                s.spawn(|_| {
                    instability_out =
                        Some(stream_instability(&nodout_path, &bndout_path, config, cancel));
                });
            }
        });

        let mut data = RunData::default();
        if let Some(result) = d3hsp_out {
            let parsed = result?;
            record_skips(&mut coverage, "d3hsp", parsed.skipped);
            data.d3hsp = Some(parsed);
        }
        if let Some(result) = glstat_out {
            let parsed = result?;
            record_skips(&mut coverage, "glstat", parsed.skipped);
            data.glstat = parsed;
        }
        if let Some(result) = status_out {
            data.status = Some(result?);
        }
        if let Some(result) = matsum_out {
            let parsed = result?;
            record_skips(&mut coverage, "matsum", parsed.skipped);
            data.matsum = parsed;
        }
        if let Some(result) = load_out {
            let parsed = result?;
            record_skips(&mut coverage, "load_profile.csv", parsed.skipped);
            data.load_profile = parsed;
        }
        if let Some(result) = cont_out {
            let parsed = result?;
            record_skips(&mut coverage, "cont_profile.csv", parsed.skipped);
            data.cont_profile = parsed;
        }
        for result in messag_out {
            data.messag.push(result?);
        }
        if let Some(result) = instability_out {
            let (analysis, nodout_skipped, bndout_skipped) = result?;
            record_skips(&mut coverage, "nodout", nodout_skipped);
            record_skips(&mut coverage, "bndout", bndout_skipped);
            data.instability = analysis;
        }
        data.coverage = coverage;

        report::assemble(&self.dir, data, &self.config)
    }
}

fn record_skips(coverage: &mut Coverage, name: &str, skipped: u64) {
    if skipped > 0 {
        coverage.skipped_records.insert(name.to_string(), skipped);
    }
}

/// Drive both time-history streams through the instability analyzer
/// without materializing either file.
fn stream_instability(
    nodout_path: &Path,
    bndout_path: &Path,
    config: &EngineConfig,
    cancel: &CancelToken,
) -> Result<(InstabilityAnalysis, u64, u64)> {
    let mut nodout = if nodout_path.is_file() {
        Some(NodoutReader::open(
            nodout_path,
            config.tracked_node_cap,
            cancel,
        )?)
    } else {
        None
    };
    let mut bndout = if bndout_path.is_file() {
        Some(BndoutReader::open(
            bndout_path,
            config.tracked_node_cap,
            cancel,
        )?)
    } else {
        None
    };

    let analysis = instability::analyze(
        || match nodout.as_mut() {
            Some(reader) => reader.next_sample(),
            None => Ok(None),
        },
        || match bndout.as_mut() {
            Some(reader) => reader.next_sample(),
            None => Ok(None),
        },
        config.oscillation_window,
    )?;

    let nodout_skipped = nodout.map(|r| r.skipped).unwrap_or(0);
    let bndout_skipped = bndout.map(|r| r.skipped).unwrap_or(0);
    Ok((analysis, nodout_skipped, bndout_skipped))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TerminationStatus;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &Path, name: &str, content: &str) {
        std::fs::File::create(dir.join(name))
            .unwrap()
            .write_all(content.as_bytes())
            .unwrap();
    }

    const GLSTAT: &str = "\
 dt of cycle 100 is controlled by shell 7710 of part 5

 time...................... 1.0000E-03
 time step................. 1.0000E-06
 kinetic energy............ 5.0000E+05
 internal energy........... 1.0000E+05
 total energy.............. 6.0000E+05
 total energy / initial energy.. 1.0010E+00
";

    const MESSAG: &str = "\
 *** Warning 50135 (SOL+135)
 tracked node can not be found
 N o r m a l    t e r m i n a t i o n
";

    #[test]
    fn test_engine__empty_directory__then_missing_inputs_error() {
        let dir = TempDir::new().unwrap();
        let engine = Engine::new(dir.path(), EngineConfig::default());
        assert!(matches!(
            engine.run(),
            Err(EngineError::MissingRequiredInputs { .. })
        ));
    }

    #[test]
    fn test_engine__glstat_and_messag__then_report_produced() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "glstat", GLSTAT);
        write_file(dir.path(), "messag", MESSAG);

        let engine = Engine::new(dir.path(), EngineConfig::default());
        let report = engine.run().unwrap();

        assert_eq!(report.termination.status, TerminationStatus::Normal);
        assert_eq!(report.energy.samples, 1);
        assert!(report.warnings.iter().any(|w| w.code == 50135));
        assert!(report.coverage.files_found.contains(&"glstat".to_string()));
        assert!(report.coverage.files_missing.contains(&"d3hsp".to_string()));
    }

    #[test]
    fn test_engine__cancelled_before_run__then_aborted() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "glstat", GLSTAT);
        write_file(dir.path(), "messag", MESSAG);

        let engine = Engine::new(dir.path(), EngineConfig::default());
        engine.cancel_token().cancel();
        assert!(matches!(engine.run(), Err(EngineError::Aborted)));
    }

    #[test]
    fn test_engine__identical_runs__then_identical_serialized_reports() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "glstat", GLSTAT);
        write_file(dir.path(), "messag", MESSAG);

        let run = || {
            let engine = Engine::new(dir.path(), EngineConfig::default());
            serde_json::to_string(&engine.run().unwrap()).unwrap()
        };
        assert_eq!(run(), run());
    }
}
