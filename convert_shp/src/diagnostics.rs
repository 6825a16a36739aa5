use std::fmt;

use serde::{Deserialize, Serialize};

/// Why a fit couldn't be done as requested. None of these fail a road; they
/// explain a degrade-and-continue decision.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum FitIssue {
    /// Collinear or coincident points prevent circle or polynomial fitting.
    DegenerateGeometry(String),
    /// A boundary-constraint linear system had no usable solution.
    SingularSystem,
    InsufficientPoints { needed: usize, got: usize },
    /// A lower-degree polynomial can't satisfy position and tangent at once;
    /// position won, and this is the leftover tangent error in local units.
    ConstraintConflict { tangent_residual: f64 },
    /// The segment can't participate in network connections.
    MissingNodeIds,
}

impl fmt::Display for FitIssue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FitIssue::DegenerateGeometry(why) => write!(f, "degenerate geometry: {}", why),
            FitIssue::SingularSystem => write!(f, "singular constraint system"),
            FitIssue::InsufficientPoints { needed, got } => {
                write!(f, "needs {} points, got {}", needed, got)
            }
            FitIssue::ConstraintConflict { tangent_residual } => write!(
                f,
                "position and tangent constraints conflict; tangent residual {:.6}",
                tangent_residual
            ),
            FitIssue::MissingNodeIds => write!(f, "missing start/end node ids"),
        }
    }
}

/// One degrade-and-continue record: which road, what went wrong, what the
/// fitter did instead.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FitDiagnostic {
    pub road_id: String,
    pub issue: FitIssue,
    pub fallback: String,
}

impl fmt::Display for FitDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {} ({})", self.road_id, self.issue, self.fallback)
    }
}

/// Accumulates diagnostics through a conversion, instead of scattering them
/// into logs. The caller decides how to present them.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    pub events: Vec<FitDiagnostic>,
}

impl Diagnostics {
    pub fn new() -> Diagnostics {
        Diagnostics::default()
    }

    pub fn record(&mut self, road_id: &str, issue: FitIssue, fallback: &str) {
        debug!("{}: {} -> {}", road_id, issue, fallback);
        self.events.push(FitDiagnostic {
            road_id: road_id.to_string(),
            issue,
            fallback: fallback.to_string(),
        });
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.events.extend(other.events);
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
