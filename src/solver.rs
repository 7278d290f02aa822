use crate::constraints::{build_formula, Formula};
use crate::resolve::expand;
use crate::types::{
    Action, PackageId, Problem, Res, Resolution, ResolutionError, SolverFailureSnafu,
};
use crate::z3_helpers::{default_config, one, zero};
use indexmap::IndexSet;
use itertools::Itertools;
use log::debug;
use z3::ast::Int;
use z3::{Context, Optimize, SatResult};

enum Outcome {
    Unsat,
    Model(Vec<bool>),
}

/// Hand the model to Z3's optimizing solver. Each package variable is an
/// integer pinned to {0,1}; the objective is a single minimized linear sum.
/// `Unknown` (timeout, resource-out) surfaces as a failure with Z3's reason,
/// without retry.
fn solve_formula(formula: &Formula) -> Result<Outcome, ResolutionError> {
    let cfg = default_config();
    let ctx = Context::new(&cfg);
    let solver = Optimize::new(&ctx);

    let vars = (0..formula.vars.len())
        .map(|i| Int::new_const(&ctx, i as u32))
        .collect_vec();

    for v in &vars {
        solver.assert(&v.ge(&zero(&ctx)));
        solver.assert(&v.le(&one(&ctx)));
    }

    for clause in &formula.clauses {
        let owner = &vars[clause.owner];
        if clause.alternatives.is_empty() {
            // no alternatives left after expansion: the owner can never be installed
            solver.assert(&owner.le(&zero(&ctx)));
        } else {
            let alternatives = clause.alternatives.iter().map(|&d| &vars[d]).collect_vec();
            let sum = Int::add(&ctx, &alternatives);
            solver.assert(&Int::sub(&ctx, &[&sum, owner]).ge(&zero(&ctx)));
        }
    }

    for &(p, c) in &formula.conflicts {
        let sum = Int::add(&ctx, &[&vars[p], &vars[c]]);
        solver.assert(&sum.le(&one(&ctx)));
    }

    solver.assert(&vars[formula.goal].ge(&one(&ctx)));

    let terms = formula
        .weights
        .iter()
        .zip(&vars)
        .map(|(&w, v)| Int::mul(&ctx, &[&Int::from_i64(&ctx, w), v]))
        .collect_vec();
    let objective = Int::add(&ctx, &terms.iter().collect_vec());
    solver.minimize(&objective);

    match solver.check(&[]) {
        SatResult::Unsat => Ok(Outcome::Unsat),
        SatResult::Unknown => SolverFailureSnafu {
            reason: solver
                .get_reason_unknown()
                .unwrap_or_else(|| "unknown".to_owned()),
        }
        .fail(),
        SatResult::Sat => {
            let model = solver.get_model().ok_or_else(|| {
                SolverFailureSnafu {
                    reason: "satisfiable but no model produced",
                }
                .build()
            })?;
            let mut assignment = Vec::with_capacity(vars.len());
            for (i, v) in vars.iter().enumerate() {
                let value = model
                    .eval(v, true)
                    .and_then(|interp| interp.as_i64())
                    .ok_or_else(|| {
                        SolverFailureSnafu {
                            reason: format!("no value for {} in the model", formula.vars[i]),
                        }
                        .build()
                    })?;
                assignment.push(value == 1);
            }
            Ok(Outcome::Model(assignment))
        }
    }
}

/// Diff the optimal assignment against the initial set. Removals come first,
/// then installs, each in variable order; the grouping is a presentation
/// convention for consumers applying the plan, not a correctness requirement.
fn actions_from_assignment(
    formula: &Formula,
    assignment: &[bool],
    initial: &IndexSet<PackageId>,
    goal_id: &str,
) -> Vec<Action> {
    let mut actions = Vec::new();
    for (id, &installed) in formula.vars.iter().zip(assignment) {
        if !installed && initial.contains(id) {
            actions.push(Action::Remove(id.clone()));
        }
    }
    for (id, &installed) in formula.vars.iter().zip(assignment) {
        if installed && !initial.contains(id) && id != goal_id {
            actions.push(Action::Install(id.clone()));
        }
    }
    actions
}

/// Run the full pipeline over a validated problem: expand every range
/// expression, build the pseudo-Boolean model, solve, and interpret the
/// optimum as a plan.
pub fn solve(problem: &Problem) -> Res {
    let ground = expand(&problem.repository);
    let formula = build_formula(&ground, &problem.initial, &problem.goal_id);
    match solve_formula(&formula)? {
        Outcome::Unsat => {
            debug!("no satisfying configuration");
            Ok(Resolution::Unsat)
        }
        Outcome::Model(assignment) => {
            let actions =
                actions_from_assignment(&formula, &assignment, &problem.initial, &problem.goal_id);
            debug!("optimal plan with {} actions", actions.len());
            Ok(Resolution::Sat { actions })
        }
    }
}

/// Convenience entry point over the three raw JSON documents.
pub fn solve_documents(repository: &str, initial: &str, constraints: &str) -> Res {
    let problem = crate::parse::parse_problem(repository, initial, constraints)?;
    solve(&problem)
}
