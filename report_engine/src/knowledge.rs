//! Built-in knowledge base for solver warning/error codes.
//!
//! Static table keyed by numeric code; codes not in the table fall back
//! to a range-based severity with a generic entry. The table is loaded
//! once and never mutated.

use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::model::Severity;

/// Catalogued diagnosis for one solver message code.
#[derive(Debug, Clone)]
pub struct CodeInfo {
    pub code: u32,
    pub severity: Severity,
    pub category: &'static str,
    pub title: String,
    pub description: String,
    pub recommendation: String,
}

struct Entry {
    code: u32,
    severity: Severity,
    category: &'static str,
    title: &'static str,
    description: &'static str,
    recommendation: &'static str,
}

const ENTRIES: &[Entry] = &[
    Entry {
        code: 50135,
        severity: Severity::Warning,
        category: "contact",
        title: "Tracked node not constrained (tied interface)",
        description: "A slave node in a tied contact interface could not be found on any master segment. The node will be unconstrained and may separate from the tied interface.",
        recommendation: "Check mesh compatibility between tied parts. Ensure slave nodes are within projection distance of master segments. Consider SBOPT=3 and DEPTH=5 in *CONTACT. Refine the mesh near the interface.",
    },
    Entry {
        code: 50136,
        severity: Severity::Warning,
        category: "contact",
        title: "Tracked node too far from segment",
        description: "A slave node in a tied contact is farther from the nearest master segment than the search tolerance allows, so it cannot be constrained.",
        recommendation: "Increase the tied contact search distance (SFACT) or improve mesh alignment between the surfaces. Check for geometric gaps between tied parts.",
    },
    Entry {
        code: 50120,
        severity: Severity::Warning,
        category: "contact",
        title: "Contact segment normals inconsistent",
        description: "Contact segment normals are inconsistent or reversed.",
        recommendation: "Check segment normal orientation and SSTYP/MSTYP settings. Verify segment connectivity.",
    },
    Entry {
        code: 20248,
        severity: Severity::Warning,
        category: "contact",
        title: "Initial penetration in contact",
        description: "Nodes penetrate contact surfaces at time zero, which injects artificial energy at the start of the run.",
        recommendation: "Fix initial penetrations in the mesh, or use *CONTROL_CONTACT PENOPT / IGNORE options. Check mesh alignment at contact surfaces.",
    },
    Entry {
        code: 20200,
        severity: Severity::Warning,
        category: "contact",
        title: "Contact interface has no segments",
        description: "A contact interface has no segments defined.",
        recommendation: "Verify the contact definition; ensure segment sets reference the correct part or set ids.",
    },
    Entry {
        code: 30010,
        severity: Severity::Critical,
        category: "failure",
        title: "Negative volume (error termination)",
        description: "An element developed negative volume and the run error-terminated. The element is distorted beyond physical limits.",
        recommendation: "Add erosion criteria (*MAT_ADD_EROSION), or use ERODE=1 with an appropriate TSMIN in *CONTROL_TIMESTEP. Improve mesh quality in the failing region and check the applied loading.",
    },
    Entry {
        code: 40003,
        severity: Severity::Critical,
        category: "failure",
        title: "Negative volume in element",
        description: "An element developed negative volume during computation, indicating severe mesh distortion.",
        recommendation: "Check element quality near the reported element. Add erosion criteria or reduce the timestep scale factor.",
    },
    Entry {
        code: 40004,
        severity: Severity::Critical,
        category: "failure",
        title: "Negative volume in shell element",
        description: "A shell element developed negative area/volume.",
        recommendation: "Check for excessive shell deformation. Add element erosion or reduce shell TSMIN; verify shell thickness.",
    },
    Entry {
        code: 30200,
        severity: Severity::Critical,
        category: "instability",
        title: "NaN velocity detected",
        description: "A NaN velocity was detected; the computation has diverged.",
        recommendation: "Check for zero-volume elements, excessive mass scaling, or contact instabilities. Reduce TSSFAC and verify material properties.",
    },
    Entry {
        code: 30100,
        severity: Severity::Critical,
        category: "instability",
        title: "NaN in stress calculation",
        description: "NaN detected in stress computation, indicating divergence.",
        recommendation: "Check material properties: density, modulus, and yield stress must be non-zero and physically reasonable. Reduce TSSFAC if needed.",
    },
    Entry {
        code: 10103,
        severity: Severity::Critical,
        category: "memory",
        title: "Out of memory",
        description: "The solver ran out of allocated memory during execution.",
        recommendation: "Increase the memory= and memory2= allocations. Check for excessive contact segment generation, or distribute over more MPI ranks.",
    },
    Entry {
        code: 10100,
        severity: Severity::Critical,
        category: "memory",
        title: "Insufficient memory for decomposition",
        description: "Not enough memory for the domain decomposition.",
        recommendation: "Increase the memory allocation, e.g. memory=200m memory2=200m or higher.",
    },
    Entry {
        code: 40100,
        severity: Severity::Warning,
        category: "mesh",
        title: "Degenerate element detected",
        description: "An element has a very poor aspect ratio or is degenerate.",
        recommendation: "Improve mesh quality; remesh elements with poor aspect ratios.",
    },
    Entry {
        code: 30001,
        severity: Severity::Warning,
        category: "timestep",
        title: "Element timestep below minimum",
        description: "An element's timestep fell below the TSMIN threshold; the element may be eroded or the run terminated.",
        recommendation: "Review TSMIN and ERODE in *CONTROL_TIMESTEP. If erosion is active, check how many elements are being removed.",
    },
    Entry {
        code: 41200,
        severity: Severity::Warning,
        category: "material",
        title: "Material failure criterion met",
        description: "A material failure criterion has been activated.",
        recommendation: "Check failure strain/stress values in the material definition and that the failure model fits the loading.",
    },
    Entry {
        code: 60100,
        severity: Severity::Warning,
        category: "rigid_body",
        title: "Rigid body mass too small",
        description: "A rigid body has very small mass, which can destabilize the solution.",
        recommendation: "Check rigid body material density and geometry.",
    },
    Entry {
        code: 70100,
        severity: Severity::Warning,
        category: "adaptivity",
        title: "Adaptive remeshing issue",
        description: "An issue was encountered during adaptive remeshing.",
        recommendation: "Check adaptive remeshing parameters, mesh quality criteria, and refinement levels.",
    },
    Entry {
        code: 80100,
        severity: Severity::Warning,
        category: "sph",
        title: "SPH particle issue",
        description: "An issue with SPH particle computation.",
        recommendation: "Check SPH parameters and particle distribution.",
    },
    Entry {
        code: 90001,
        severity: Severity::Critical,
        category: "system",
        title: "License error",
        description: "The solver license could not be acquired or has expired.",
        recommendation: "Check the license server configuration and license file.",
    },
];

static DATABASE: Lazy<HashMap<u32, &'static Entry>> =
    Lazy::new(|| ENTRIES.iter().map(|e| (e.code, e)).collect());

/// Look up a code; unknown codes get a generic entry with severity
/// inferred from the code range.
pub fn lookup(code: u32) -> CodeInfo {
    if let Some(entry) = DATABASE.get(&code) {
        return CodeInfo {
            code,
            severity: entry.severity,
            category: entry.category,
            title: entry.title.to_string(),
            description: entry.description.to_string(),
            recommendation: entry.recommendation.to_string(),
        };
    }
    let severity = if code < 20_000 {
        Severity::Critical
    } else if code < 60_000 {
        Severity::Warning
    } else {
        Severity::Info
    };
    CodeInfo {
        code,
        severity,
        category: "uncatalogued",
        title: format!("Code {code}"),
        description: format!("Warning/Error code {code} (not in built-in database)."),
        recommendation: format!("Consult the solver documentation for details on code {code}."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup__known_code__then_catalogued_entry() {
        let info = lookup(50135);
        assert_eq!(info.severity, Severity::Warning);
        assert_eq!(info.category, "contact");
        assert!(info.title.contains("tied interface"));
    }

    #[test]
    fn test_lookup__unknown_code__then_range_severity() {
        assert_eq!(lookup(15000).severity, Severity::Critical);
        assert_eq!(lookup(35000).severity, Severity::Warning);
        assert_eq!(lookup(75000).severity, Severity::Info);
        assert_eq!(lookup(35000).category, "uncatalogued");
    }

    #[test]
    fn test_lookup__negative_volume_code__then_critical() {
        let info = lookup(30010);
        assert_eq!(info.severity, Severity::Critical);
        assert_eq!(info.category, "failure");
    }
}
