#![forbid(unsafe_code)]

mod constraints;
mod parse;
mod resolve;
mod solver;
mod types;
mod z3_helpers;

pub use constraints::{build_formula, Clause, Formula, Var, UNINSTALL_COST};
pub use parse::{
    parse_constraint, parse_constraints, parse_initial, parse_problem, parse_range,
    parse_repository,
};
pub use resolve::{expand, GroundPackage, GroundRepository, Resolver};
pub use solver::{solve, solve_documents};
pub use types::{
    Action, Constraint, Package, PackageId, Problem, RangeExpr, Relation, Repository, Res,
    Resolution, ResolutionError, Sign, Version,
};
