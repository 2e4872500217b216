/* The 0/1 model for cut selection, built on COIN-OR CBC.

One binary per node ("used") and one binary per non-self cut ("chosen").
Self-cuts get no variable at all, so the cut index recorded for a node is
always the position in the catalog's original cuts array.

Depth-aware builds add an integer level per node and a global depth D,
linked to the cut choice with big-M rows where M is the depth bound.
*/

use super::*;

use coin_cbc::{Col, Model, Sense, Solution};
use indexmap::{IndexMap, IndexSet};

const EPSILON: f64 = 1e-6;

pub struct CutVar {
    pub col: Col,
    /// Position in the node's original cuts array, self-cuts included.
    pub cut_index: usize,
    /// Construction-order token; stable across identical catalogs.
    pub lex_weight: usize,
    pub leaves: Vec<String>,
    pub inv_cost: u64,
    pub area_cost: u64,
    pub depth_cost: u64,
}

pub struct CoverModel {
    pub(crate) model: Model,
    used: IndexMap<String, Col>,
    cuts: IndexMap<String, Vec<CutVar>>,
    depth: Option<Col>,
    roots: Vec<String>,
}

impl CoverModel {
    pub fn build(catalog: &Catalog, depth_bound: Option<u64>, fix_depth: Option<u64>) -> CoverModel {
        let mut model = Model::default();
        let names: IndexSet<&str> = catalog.nodes.iter().map(|nd| nd.name.as_str()).collect();

        // Node-used variables, in catalog order.
        let used: IndexMap<String, Col> = catalog
            .nodes
            .iter()
            .map(|nd| (nd.name.clone(), model.add_binary()))
            .collect();

        // Cut-chosen variables. Self-cuts are omitted here, not forbidden
        // later: their index must never exist in the variable set.
        let mut cuts: IndexMap<String, Vec<CutVar>> = IndexMap::with_capacity(catalog.nodes.len());
        let mut lex_weight = 0;
        for nd in &catalog.nodes {
            let mut vars = Vec::new();
            for (cut_index, cut) in nd.cuts.iter().enumerate() {
                if cut.is_self_cut(&nd.name) {
                    continue;
                }
                vars.push(CutVar {
                    col: model.add_binary(),
                    cut_index,
                    lex_weight,
                    leaves: cut.leaves.clone(),
                    inv_cost: cut.inv_cost,
                    area_cost: cut.area_cost,
                    depth_cost: cut.depth_cost,
                });
                lex_weight += 1;
            }
            cuts.insert(nd.name.clone(), vars);
        }

        // (A) exactly one cut if used, none otherwise:
        //   sum(chosen) - used == 0
        // Nodes with only self-cuts are unselectable.
        for (name, &used_col) in &used {
            let vars = &cuts[name];
            if vars.is_empty() {
                model.set_col_upper(used_col, 0.0);
                continue;
            }
            let row = model.add_row();
            model.set_row_equal(row, 0.0);
            model.set_weight(row, used_col, -1.0);
            for cv in vars {
                model.set_weight(row, cv.col, 1.0);
            }
        }

        // (B) a chosen cut pulls in its internal leaves:
        //   chosen - used[leaf] <= 0
        // Leaves outside the catalog are primary inputs and need no row.
        for name in cuts.keys() {
            for cv in &cuts[name] {
                for leaf in internal_leaves(cv, &names) {
                    let row = model.add_row();
                    model.set_row_upper(row, 0.0);
                    model.set_weight(row, cv.col, 1.0);
                    model.set_weight(row, used[leaf], -1.0);
                }
            }
        }

        // (C) level linking, only when a depth bound is supplied.
        let mut depth = None;
        if let Some(bound) = depth_bound {
            let bound = bound.max(1);
            let big_m = bound as f64;

            let levels: IndexMap<&str, Col> = catalog
                .nodes
                .iter()
                .map(|nd| {
                    let col = model.add_integer();
                    model.set_col_lower(col, 0.0);
                    model.set_col_upper(col, big_m);
                    (nd.name.as_str(), col)
                })
                .collect();
            let d = model.add_integer();
            model.set_col_lower(d, 0.0);
            model.set_col_upper(d, big_m);

            // Declared inputs sit at level 0, overriding the unit floor
            // below even when they appear in the catalog as nodes.
            let inputs: IndexSet<&str> = catalog.inputs.iter().map(String::as_str).collect();
            for inp in &inputs {
                if let Some(&lvl) = levels.get(inp) {
                    model.set_col_upper(lvl, 0.0);
                }
            }

            for (name, &lvl) in &levels {
                let used_col = used[*name];
                if !inputs.contains(name) {
                    // used == 1 forces level >= 1.
                    let row = model.add_row();
                    model.set_row_lower(row, 0.0);
                    model.set_weight(row, lvl, 1.0);
                    model.set_weight(row, used_col, -1.0);
                    // used == 0 forces level == 0.
                    let row = model.add_row();
                    model.set_row_upper(row, 0.0);
                    model.set_weight(row, lvl, 1.0);
                    model.set_weight(row, used_col, -big_m);
                }

                for cv in &cuts[*name] {
                    let step = cv.depth_cost.max(1) as f64;
                    for leaf in internal_leaves(cv, &names) {
                        // chosen == 1 implies level >= level[leaf] + step:
                        //   level - level[leaf] - M·chosen >= step - M
                        let row = model.add_row();
                        model.set_row_lower(row, step - big_m);
                        if leaf == *name {
                            // The leaf is the node itself; the level terms
                            // cancel and the row pins chosen to 0.
                            model.set_weight(row, cv.col, -big_m);
                        } else {
                            model.set_weight(row, lvl, 1.0);
                            model.set_weight(row, levels[leaf], -1.0);
                            model.set_weight(row, cv.col, -big_m);
                        }
                    }
                }
            }

            // D dominates every level.
            for &lvl in levels.values() {
                let row = model.add_row();
                model.set_row_lower(row, 0.0);
                model.set_weight(row, d, 1.0);
                model.set_weight(row, lvl, -1.0);
            }
            if let Some(fix) = fix_depth {
                model.set_col_lower(d, fix as f64);
                model.set_col_upper(d, fix as f64);
            }
            depth = Some(d);
        }

        // (D) roots must be realized.
        let roots: Vec<String> = catalog.roots().iter().map(|r| r.to_string()).collect();
        for root in &roots {
            if let Some(&used_col) = used.get(root) {
                model.set_col_lower(used_col, 1.0);
            }
        }

        CoverModel {
            model,
            used,
            cuts,
            depth,
            roots,
        }
    }

    /// Install the minimization objective. Depth goals require a
    /// depth-enabled build; violating that is a misuse of the driver.
    pub(crate) fn set_objective(&mut self, goal: Goal) -> Result<(), Error> {
        if goal.needs_depth() && self.depth.is_none() {
            return Err(Error::Model(format!(
                "objective {goal:?} requested but depth model not built"
            )));
        }

        self.model.set_obj_sense(Sense::Minimize);
        for vars in self.cuts.values() {
            for cv in vars {
                let coeff = goal.cut_coeff(cv.inv_cost, cv.area_cost);
                if coeff != 0 {
                    self.model.set_obj_coeff(cv.col, coeff as f64);
                }
            }
        }
        if let Some(d) = self.depth {
            let coeff = goal.depth_coeff();
            if coeff != 0 {
                self.model.set_obj_coeff(d, coeff as f64);
            }
        }
        Ok(())
    }

    /// The chosen cut per used node, keyed in catalog order, carrying the
    /// original positional cut index.
    pub fn chosen_cuts(&self, solution: &Solution) -> IndexMap<String, usize> {
        let mut chosen = IndexMap::new();
        for (name, &used_col) in &self.used {
            if solution.col(used_col) > 0.5 {
                if let Some(cv) = self.cuts[name].iter().find(|cv| solution.col(cv.col) > 0.5) {
                    log::debug!(
                        "{name}: cut {} (lex {}, leaves {:?})",
                        cv.cut_index,
                        cv.lex_weight,
                        cv.leaves
                    );
                    chosen.insert(name.clone(), cv.cut_index);
                }
            }
        }
        chosen
    }

    pub fn depth_value(&self, solution: &Solution) -> Option<u64> {
        self.depth.map(|d| solution.col(d).round() as u64)
    }

    /// Certify that the column values form an integral selection satisfying
    /// the boolean constraints. A stopped CBC run hands back whatever its
    /// last iterate was; this distinguishes a real incumbent from an LP
    /// fractional point.
    pub fn incumbent_ok(&self, solution: &Solution) -> bool {
        let as_bool = |col: Col| -> Option<bool> {
            let v = solution.col(col);
            if (v - v.round()).abs() > EPSILON {
                return None;
            }
            match v.round() as i64 {
                0 => Some(false),
                1 => Some(true),
                _ => None,
            }
        };

        for (name, &used_col) in &self.used {
            let Some(used) = as_bool(used_col) else {
                return false;
            };
            let mut active = 0;
            for cv in &self.cuts[name] {
                match as_bool(cv.col) {
                    Some(true) => active += 1,
                    Some(false) => {}
                    None => return false,
                }
            }
            // (A)
            if active != used as usize {
                return false;
            }
            // (B)
            for cv in &self.cuts[name] {
                if as_bool(cv.col) != Some(true) {
                    continue;
                }
                for leaf in &cv.leaves {
                    if let Some(&leaf_used) = self.used.get(leaf) {
                        if as_bool(leaf_used) != Some(true) {
                            return false;
                        }
                    }
                }
            }
        }
        // (D)
        for root in &self.roots {
            if let Some(&used_col) = self.used.get(root) {
                if as_bool(used_col) != Some(true) {
                    return false;
                }
            }
        }
        true
    }
}

/// Unique catalog-internal leaves of a cut. Duplicate leaf names must not
/// double a row's coefficients.
fn internal_leaves<'a>(cv: &'a CutVar, names: &IndexSet<&str>) -> IndexSet<&'a str> {
    cv.leaves
        .iter()
        .map(String::as_str)
        .filter(|leaf| names.contains(leaf))
        .collect()
}
