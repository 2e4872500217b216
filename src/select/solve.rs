/* The two-phase solve driver.

Pure-cost objectives run a single model under a short wall-clock and a
relative gap. Depth-aware objectives first minimize the global depth D
(stopping at the first feasible cover), then rebuild with D frozen and
minimize the tie-breaker; phase A's cover is kept as a fallback if phase B
comes back empty-handed.
*/

use super::*;

use crate::select::model::CoverModel;
use coin_cbc::{raw::Status, Solution};
use indexmap::IndexMap;
use serde::Serialize;

use std::io::Write;
use std::path::Path;

struct SolverParams {
    seconds: u64,
    threads: u32,
    seed: u32,
    ratio_gap: Option<f64>,
    allowable_gap: Option<f64>,
    /// Stop as soon as this many incumbents have been found.
    max_solutions: Option<u32>,
}

/// Budget for og/inv/area: one model, wide and shallow.
const FLAT_PARAMS: SolverParams = SolverParams {
    seconds: 15,
    threads: 50,
    seed: 0,
    ratio_gap: Some(0.05),
    allowable_gap: None,
    max_solutions: None,
};

/// Phase A: find any cover quickly, its D value seeds phase B.
const PHASE_A_PARAMS: SolverParams = SolverParams {
    seconds: 120,
    threads: 16,
    seed: 1,
    ratio_gap: None,
    allowable_gap: Some(1.0),
    max_solutions: Some(1),
};

/// Phase B: depth is frozen, spend the budget on the tie-breaker.
const PHASE_B_PARAMS: SolverParams = SolverParams {
    seconds: 60,
    threads: 16,
    seed: 1,
    ratio_gap: None,
    allowable_gap: None,
    max_solutions: None,
};

pub fn solve(catalog: &Catalog, objective: Objective, out_path: &Path) -> Result<Report, Error> {
    if objective.needs_depth() {
        solve_depth(catalog, objective, out_path)
    } else {
        solve_flat(catalog, objective, out_path)
    }
}

fn solve_flat(catalog: &Catalog, objective: Objective, out_path: &Path) -> Result<Report, Error> {
    let mut model = CoverModel::build(catalog, None, None);
    model.set_objective(objective.goal())?;

    let (solution, status) = run_solver(&mut model, &FLAT_PARAMS);
    println!("Status: {status}");
    if !status.is_success() {
        println!("No feasible solution.");
        return Ok(Report::failed(status));
    }

    let objective_value = solution.raw().obj_value();
    println!("Objective value ({objective}) = {objective_value}");

    let chosen = model.chosen_cuts(&solution);
    write_chosen_cuts(out_path, &chosen)?;

    Ok(Report {
        status,
        objective_value: Some(objective_value),
        depth: None,
        tiebreak: None,
    })
}

fn solve_depth(catalog: &Catalog, objective: Objective, out_path: &Path) -> Result<Report, Error> {
    let bound = depth::depth_upper_bound(catalog).max(catalog.nodes.len().max(1) as u64);
    log::info!("using depth upper bound UB = {bound}");

    // Phase A: minimize D, stop at the first cover.
    let mut phase_a = CoverModel::build(catalog, Some(bound), None);
    phase_a.set_objective(Goal::Depth)?;
    let (solution_a, status_a) = run_solver(&mut phase_a, &PHASE_A_PARAMS);
    println!("Phase A status: {status_a}");
    if !status_a.is_success() {
        println!("No feasible solution in phase A.");
        return Ok(Report::failed(status_a));
    }

    let best_depth = phase_a
        .depth_value(&solution_a)
        .ok_or_else(|| Error::Model("phase A solved without a depth variable".into()))?;
    println!("Phase A best depth D = {best_depth}");
    let fallback = phase_a.chosen_cuts(&solution_a);

    // Phase B: freeze D and minimize the tie-breaker.
    let tie_goal = match objective {
        Objective::Depth => Goal::DepthTiebreakArea,
        _ => Goal::OverallTiebreak,
    };
    let mut phase_b = CoverModel::build(catalog, Some(bound), Some(best_depth));
    phase_b.set_objective(tie_goal)?;
    let (solution_b, status_b) = run_solver(&mut phase_b, &PHASE_B_PARAMS);
    println!("Phase B status: {status_b}");

    let (status, chosen, tiebreak) = if status_b.is_success() {
        let tiebreak = solution_b.raw().obj_value();
        (status_b, phase_b.chosen_cuts(&solution_b), Some(tiebreak))
    } else {
        println!("No feasible solution in phase B; keeping the phase A cover.");
        (status_a, fallback, None)
    };

    write_chosen_cuts(out_path, &chosen)?;
    println!("Objective value ({objective}) = {best_depth}");
    println!("Global depth D = {best_depth}");
    if let Some(tiebreak) = tiebreak {
        println!("Phase B tie-break objective = {tiebreak}");
    }

    Ok(Report {
        status,
        objective_value: Some(best_depth as f64),
        depth: Some(best_depth),
        tiebreak,
    })
}

fn run_solver(model: &mut CoverModel, params: &SolverParams) -> (Solution, SolveStatus) {
    {
        let cbc = &mut model.model;
        cbc.set_parameter("logLevel", "0");
        cbc.set_parameter("seconds", &params.seconds.to_string());
        cbc.set_parameter("threads", &params.threads.to_string());
        cbc.set_parameter("randomCbcSeed", &params.seed.to_string());
        if let Some(gap) = params.ratio_gap {
            cbc.set_parameter("ratioGap", &gap.to_string());
        }
        if let Some(gap) = params.allowable_gap {
            cbc.set_parameter("allowableGap", &gap.to_string());
        }
        if let Some(count) = params.max_solutions {
            cbc.set_parameter("maxSolutions", &count.to_string());
        }
    }

    let solution = model.model.solve();
    let status = classify(model, &solution);
    log::info!(
        "CBC status {:?}, {:?}, obj = {} -> {status}",
        solution.raw().status(),
        solution.raw().secondary_status(),
        solution.raw().obj_value(),
    );
    (solution, status)
}

fn classify(model: &CoverModel, solution: &Solution) -> SolveStatus {
    let raw = solution.raw();
    match raw.status() {
        Status::Finished if raw.is_proven_infeasible() => SolveStatus::Infeasible,
        Status::Finished if raw.is_proven_optimal() => SolveStatus::Optimal,
        Status::Finished => SolveStatus::Unknown,
        // A limit fired before the search finished. The columns only count
        // if they hold a genuine integral incumbent rather than a
        // fractional iterate.
        _ if model.incumbent_ok(solution) => SolveStatus::Feasible,
        _ => SolveStatus::Unknown,
    }
}

#[derive(Serialize)]
struct ChosenCutsFile<'a> {
    chosen_cuts: &'a IndexMap<String, usize>,
}

fn write_chosen_cuts(path: &Path, chosen: &IndexMap<String, usize>) -> Result<(), Error> {
    let file = std::fs::File::create(path)?;
    let mut writer = std::io::BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &ChosenCutsFile { chosen_cuts: chosen })
        .map_err(std::io::Error::from)?;
    writer.flush()?;
    log::info!("written chosen cuts to {}", path.display());
    Ok(())
}
