//! End-to-end runs over small synthetic result directories, driving the
//! engine through its public API only.

use std::io::Write;
use std::path::Path;

use tempfile::TempDir;

use report_engine::model::{Evidence, Severity, TerminationStatus};
use report_engine::{Engine, EngineConfig};

fn write_file(dir: &Path, name: &str, content: &str) {
    std::fs::File::create(dir.join(name))
        .unwrap()
        .write_all(content.as_bytes())
        .unwrap();
}

/// A high-speed-printer log that walks every section and ends in an
/// error banner.
const D3HSP_ERROR_TERM: &str = "\
     Date: 03/15/2024    Time: 10:00:00
 |  Version : mpp s R11.2.2  |
 |  Revision: 14531  |
 |  Hostname : node042  |
 Input file: crash_model.k
 MPP execution with    8 procs

 L I S T   O F   K E Y W O R D   C O U N T S
 total # of *NODE card..................        40210

 c o n t r o l   i n f o r m a t i o n

 number of materials or property sets....        12
 number of nodal+scalar points...........     40210
 number of shell elements................     14200
 termination time........................ 1.200E-01

 p a r t   d e f i n i t i o n s

 bumper_beam
 part id ............ 1
 section id ......... 1
 material id ........ 101
 material type ...... 24
************************************************************************

 c o n t a c t   i n t e r f a c e s

 Contact summary
 Order #  id  type  title
     1    10    13   global self contact
************************************************************************

 *** Warning 50135 (SOL+135)
      tied interface # = 10

 T i m i n g   i n f o r m a t i o n
                            CPU        %      Clock     %
  Element processing ... 6.0000E+02  50.00  6.1000E+02  50.00
 T o t a l s  1.2000E+03 100.00 1.2200E+03 100.00

 E r r o r   t e r m i n a t i o n

 Problem time   =  3.0000E-02
 Problem cycle  =  30000
 Elapsed time     300 seconds
";

const MESSAG_NORMAL: &str = " N o r m a l    t e r m i n a t i o n\n";

fn glstat_block(cycle: u64, internal: f64, hourglass: f64) -> String {
    format!(
        " dt of cycle {cycle} is controlled by shell 7710 of part 5\n\
         \n\
         time...................... {:.4E}\n\
         time step................. 1.0000E-06\n\
         kinetic energy............ 5.0000E+05\n\
         internal energy........... {internal:.4E}\n\
         hourglass energy.......... {hourglass:.4E}\n\
         total energy.............. 6.0000E+05\n\
         total energy / initial energy.. 1.0000E+00\n",
        cycle as f64 * 1e-5
    )
}

fn nodout_row(node: u64, vx: f64) -> String {
    format!(
        " {node}  1.0E-01 0.0E+00 0.0E+00  {vx:.4E} 0.0E+00 0.0E+00  0.0E+00 0.0E+00 0.0E+00  1.0E+00 2.0E+00 3.0E+00\n"
    )
}

fn bndout_row(node: u64, fx: f64) -> String {
    format!(
        " nd#    {node}  xforce=   {fx:.4E}   yforce=   0.0000E+00  zforce=   0.0000E+00   energy=   0.0000E+00\n"
    )
}

fn run(dir: &Path) -> report_engine::Report {
    Engine::new(dir, EngineConfig::default()).run().unwrap()
}

#[test]
fn test_run__error_termination_banner__then_critical_termination_finding() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "d3hsp", D3HSP_ERROR_TERM);

    let report = run(dir.path());

    assert_eq!(report.termination.status, TerminationStatus::ErrorTerminated);
    let finding = report
        .findings
        .iter()
        .find(|f| f.category == "termination")
        .expect("error termination must produce a finding");
    assert_eq!(finding.severity, Severity::Critical);
    assert!(finding.title.contains("Error termination"));
}

#[test]
fn test_run__hourglass_ratio_rises__then_warning_and_critical_at_crossings() {
    let dir = TempDir::new().unwrap();
    // Hourglass/internal share climbs 2% -> 8% -> 12% -> 15% -> 22%.
    let glstat = [2.0e3, 8.0e3, 1.2e4, 1.5e4, 2.2e4]
        .iter()
        .enumerate()
        .map(|(i, &hg)| glstat_block((i as u64 + 1) * 100, 1.0e5, hg))
        .collect::<String>();
    write_file(dir.path(), "glstat", &glstat);
    write_file(dir.path(), "messag", MESSAG_NORMAL);

    let report = run(dir.path());

    let hourglass: Vec<_> = report
        .findings
        .iter()
        .filter(|f| f.title.contains("Hourglass"))
        .collect();
    assert_eq!(hourglass.len(), 2);
    // Warning at the first sample past 10%, not earlier.
    assert_eq!(hourglass[0].severity, Severity::Warning);
    assert!(hourglass[0].evidence.contains(&Evidence::Cycle(300)));
    // Critical at the first sample past 20%, not at 15%.
    assert_eq!(hourglass[1].severity, Severity::Critical);
    assert!(hourglass[1].evidence.contains(&Evidence::Cycle(500)));
}

#[test]
fn test_run__single_boundary_force_spike__then_one_finding_references_peak() {
    let dir = TempDir::new().unwrap();
    let mut bndout = String::new();
    bndout.push_str(" n o d a l   f o r c e/e n e r g y    o u t p u t  t=   1.00000E-03\n");
    for _ in 0..400 {
        bndout.push_str(&bndout_row(77, 1.0));
    }
    bndout.push_str(" n o d a l   f o r c e/e n e r g y    o u t p u t  t=   5.00000E-03\n");
    bndout.push_str(&bndout_row(77, 1.0e4));
    write_file(dir.path(), "bndout", &bndout);
    write_file(dir.path(), "messag", MESSAG_NORMAL);

    let report = run(dir.path());

    let spikes: Vec<_> = report
        .findings
        .iter()
        .filter(|f| f.title.contains("Reaction force spike"))
        .collect();
    assert_eq!(spikes.len(), 1);
    assert!(spikes[0].evidence.contains(&Evidence::Node(77)));
    assert!(spikes[0].evidence.contains(&Evidence::Time(5.0e-3)));
    assert_eq!(report.instability.spike_nodes, 1);
}

#[test]
fn test_run__node_over_speed_limit__then_one_shooting_finding() {
    let dir = TempDir::new().unwrap();
    let nodout = format!(
        "n o d a l   p r i n t   o u t ( at time 2.0000000E-03 )\n{}{}",
        nodout_row(4141, 1500.0),
        nodout_row(4142, 10.0)
    );
    write_file(dir.path(), "nodout", &nodout);
    write_file(dir.path(), "messag", MESSAG_NORMAL);

    let report = run(dir.path());

    let shooting: Vec<_> = report
        .findings
        .iter()
        .filter(|f| f.title.contains("Shooting node"))
        .collect();
    assert_eq!(shooting.len(), 1);
    assert_eq!(shooting[0].severity, Severity::Critical);
    assert!(shooting[0].evidence.contains(&Evidence::Node(4141)));
    assert_eq!(report.instability.shooting_nodes, 1);
}

#[test]
fn test_run__same_warning_in_serial_and_rank_logs__then_event_per_log() {
    let dir = TempDir::new().unwrap();
    write_file(
        dir.path(),
        "messag",
        " *** Warning 50135 (SOL+135)\n N o r m a l    t e r m i n a t i o n\n",
    );
    write_file(dir.path(), "mes0001", " *** Warning 50135 (SOL+135)\n");

    let report = run(dir.path());

    let events: Vec<_> = report
        .warning_events
        .iter()
        .filter(|e| e.code == 50135)
        .collect();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].rank, None);
    assert_eq!(events[1].rank, Some(1));
    assert!(events.iter().all(|e| e.count == 1 && !e.is_error));

    // The merged summary still folds both logs into one total.
    let summary = report.warnings.iter().find(|w| w.code == 50135).unwrap();
    assert_eq!(summary.count, 2);
}

#[test]
fn test_run__same_directory_twice__then_byte_identical_reports() {
    let dir = TempDir::new().unwrap();
    write_file(
        dir.path(),
        "glstat",
        &format!("{}{}", glstat_block(100, 1.0e5, 2.0e3), glstat_block(200, 1.0e5, 3.0e3)),
    );
    write_file(dir.path(), "messag", MESSAG_NORMAL);
    write_file(
        dir.path(),
        "nodout",
        &format!(
            "n o d a l   p r i n t   o u t ( at time 1.0000000E-03 )\n{}",
            nodout_row(4141, 1500.0)
        ),
    );

    let render = || serde_json::to_string(&run(dir.path())).unwrap();
    assert_eq!(render(), render());
}

#[test]
fn test_run__optional_file_absent__then_no_findings_from_it() {
    let with_dir = TempDir::new().unwrap();
    let without_dir = TempDir::new().unwrap();
    let glstat = glstat_block(100, 1.0e5, 2.0e3);
    let nodout = format!(
        "n o d a l   p r i n t   o u t ( at time 1.0000000E-03 )\n{}",
        nodout_row(4141, 1500.0)
    );
    for dir in [with_dir.path(), without_dir.path()] {
        write_file(dir, "glstat", &glstat);
        write_file(dir, "messag", MESSAG_NORMAL);
    }
    write_file(with_dir.path(), "nodout", &nodout);

    let with_nodout = run(with_dir.path());
    let without_nodout = run(without_dir.path());

    assert!(without_nodout
        .findings
        .iter()
        .all(|f| f.source != "instability"));
    assert!(without_nodout.findings.len() <= with_nodout.findings.len());
    assert!(without_nodout
        .coverage
        .files_missing
        .contains(&"nodout".to_string()));
}
