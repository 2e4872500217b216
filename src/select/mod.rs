pub use crate::*;

pub mod depth;
pub mod model;
pub mod solve;

pub use solve::solve;

use std::fmt;
use std::str::FromStr;

/// User-facing objective modes. The two tie-break expressions used by
/// phase B of the depth-aware modes are internal (`Goal`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Objective {
    Original,
    Inv,
    Area,
    Depth,
    Overall,
}

impl Objective {
    pub fn needs_depth(self) -> bool {
        matches!(self, Objective::Depth | Objective::Overall)
    }

    pub(crate) fn goal(self) -> Goal {
        match self {
            Objective::Original => Goal::Original,
            Objective::Inv => Goal::Inv,
            Objective::Area => Goal::Area,
            Objective::Depth => Goal::Depth,
            Objective::Overall => Goal::Overall,
        }
    }
}

impl FromStr for Objective {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "og" | "original" => Ok(Objective::Original),
            "inv" => Ok(Objective::Inv),
            "area" => Ok(Objective::Area),
            "depth" => Ok(Objective::Depth),
            "overall" => Ok(Objective::Overall),
            _ => Err(Error::BadObjective(s.to_string())),
        }
    }
}

impl fmt::Display for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Objective::Original => "og",
            Objective::Inv => "inv",
            Objective::Area => "area",
            Objective::Depth => "depth",
            Objective::Overall => "overall",
        };
        write!(f, "{s}")
    }
}

/// Objective expressions the model builder knows how to emit. The weights
/// are fixed constants of the design, not tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Goal {
    /// 10·inv + 1·area per chosen cut.
    Original,
    Inv,
    Area,
    /// The global depth variable alone.
    Depth,
    /// 100·D + 10·area + 1·inv.
    Overall,
    /// Phase B of `depth`: area with D frozen.
    DepthTiebreakArea,
    /// Phase B of `overall`: 10·area + 1·inv with D frozen.
    OverallTiebreak,
}

impl Goal {
    pub(crate) fn needs_depth(self) -> bool {
        matches!(self, Goal::Depth | Goal::Overall)
    }

    /// Per-cut objective coefficient.
    pub(crate) fn cut_coeff(self, inv_cost: u64, area_cost: u64) -> u64 {
        match self {
            Goal::Original => 10 * inv_cost + area_cost,
            Goal::Inv => inv_cost,
            Goal::Area | Goal::DepthTiebreakArea => area_cost,
            Goal::Depth => 0,
            Goal::Overall | Goal::OverallTiebreak => 10 * area_cost + inv_cost,
        }
    }

    /// Coefficient of the global depth variable.
    pub(crate) fn depth_coeff(self) -> u64 {
        match self {
            Goal::Depth => 1,
            Goal::Overall => 100,
            _ => 0,
        }
    }
}

/// Solver outcome, in the vocabulary downstream tooling matches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    Optimal,
    Feasible,
    Infeasible,
    Unknown,
}

impl SolveStatus {
    pub fn is_success(self) -> bool {
        matches!(self, SolveStatus::Optimal | SolveStatus::Feasible)
    }
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SolveStatus::Optimal => "OPTIMAL",
            SolveStatus::Feasible => "FEASIBLE",
            SolveStatus::Infeasible => "INFEASIBLE",
            SolveStatus::Unknown => "UNKNOWN",
        };
        write!(f, "{s}")
    }
}

/// What a solve run reports back. A failed solve is a report with no
/// objective value, not an error; no chosen-cuts file is written for it.
#[derive(Debug, Clone)]
pub struct Report {
    pub status: SolveStatus,
    pub objective_value: Option<f64>,
    /// Phase A depth, for the depth-aware modes.
    pub depth: Option<u64>,
    /// Phase B tie-break objective, when phase B produced the cover.
    pub tiebreak: Option<f64>,
}

impl Report {
    pub(crate) fn failed(status: SolveStatus) -> Report {
        Report {
            status,
            objective_value: None,
            depth: None,
            tiebreak: None,
        }
    }
}
