//! The pseudo-Boolean model, built as a plain value so the solving engine
//! stays swappable: one 0/1 variable per package, one linear constraint per
//! dependency clause and conflict entry, and a minimized linear objective.

use crate::resolve::GroundRepository;
use crate::types::PackageId;
use indexmap::IndexSet;
use itertools::Itertools;
use log::debug;
use std::collections::HashMap;

/// Weight substituted for the size of an initially-installed package.
/// Substituted, not added: keeping such a package pulls the minimized
/// objective strongly negative, so the optimum only removes it when
/// feasibility demands it.
pub const UNINSTALL_COST: i64 = -1_000_000;

/// Index of a boolean variable in [`Formula::vars`].
pub type Var = usize;

/// One dependency clause of `owner`: `Σ alternatives − owner ≥ 0`, i.e. an
/// installed owner needs at least one alternative installed. No alternatives
/// pins `owner` to 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    pub owner: Var,
    pub alternatives: Vec<Var>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Formula {
    /// One entry per distinct id; the index is the variable.
    pub vars: Vec<PackageId>,
    pub clauses: Vec<Clause>,
    /// `x_p + x_c ≤ 1` per entry.
    pub conflicts: Vec<(Var, Var)>,
    /// Pinned to 1.
    pub goal: Var,
    /// Objective coefficients, minimized as `Σ w·x`.
    pub weights: Vec<i64>,
}

/// Emit the model for an expanded repository: exactly one variable per id,
/// one constraint per clause and per conflict entry, and the goal pin.
/// Variable order is repository insertion order, so the formula is
/// deterministic.
pub fn build_formula(
    ground: &GroundRepository,
    initial: &IndexSet<PackageId>,
    goal_id: &str,
) -> Formula {
    let vars = ground.packages.keys().cloned().collect_vec();
    let index: HashMap<&str, Var> = vars
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();
    let var_of = |id: &str| -> Var {
        *index
            .get(id)
            .unwrap_or_else(|| panic!("Impossible: expansion produced unknown id {id}"))
    };

    let mut clauses = Vec::new();
    let mut conflicts = Vec::new();
    for (owner, package) in ground.packages.values().enumerate() {
        for clause in &package.depends {
            clauses.push(Clause {
                owner,
                alternatives: clause.iter().map(|d| var_of(d)).collect_vec(),
            });
        }
        for c in &package.conflicts {
            conflicts.push((owner, var_of(c)));
        }
    }

    let weights = ground
        .packages
        .values()
        .map(|package| {
            if initial.contains(&package.id) {
                UNINSTALL_COST
            } else {
                package.size as i64
            }
        })
        .collect_vec();

    let goal = var_of(goal_id);

    debug!(
        "formula: {} vars, {} clauses, {} conflicts",
        vars.len(),
        clauses.len(),
        conflicts.len()
    );
    Formula {
        vars,
        clauses,
        conflicts,
        goal,
        weights,
    }
}
