//! The three input documents (repository, initial set, constraints) and the
//! range-expression grammar `<name><op><version>`.

use crate::types::{
    Constraint, MalformedConstraintSnafu, MalformedDocumentSnafu, MalformedExpressionSnafu,
    Package, PackageId, Problem, RangeExpr, Relation, Repository, ResolutionError, Sign, Version,
};
use serde::Deserialize;
use snafu::prelude::*;

// Name and version tokens use the alphabet [.+a-zA-Z0-9-]; these are the only
// characters outside it.
const OPERATOR_CHARS: &[char] = &['<', '>', '='];

#[derive(Debug, Deserialize)]
struct PackageRecord {
    name: String,
    version: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    depends: Vec<Vec<String>>,
    #[serde(default)]
    conflicts: Vec<String>,
}

/// Parse one range expression: `<name><op><version>` with
/// `<op> ∈ {=, <, <=, >, >=}`, or a bare `<name>` matching any version.
pub fn parse_range(expr: &str) -> Result<RangeExpr, ResolutionError> {
    let Some(at) = expr.find(OPERATOR_CHARS) else {
        ensure!(!expr.is_empty(), MalformedExpressionSnafu { expr });
        return Ok(RangeExpr {
            name: expr.to_owned(),
            rel: Relation::Any,
        });
    };

    let name = &expr[..at];
    let rest = &expr[at..];
    let (build, version): (fn(Version) -> Relation, &str) =
        if let Some(v) = rest.strip_prefix("<=") {
            (Relation::Le, v)
        } else if let Some(v) = rest.strip_prefix(">=") {
            (Relation::Ge, v)
        } else if let Some(v) = rest.strip_prefix('<') {
            (Relation::Lt, v)
        } else if let Some(v) = rest.strip_prefix('>') {
            (Relation::Gt, v)
        } else if let Some(v) = rest.strip_prefix('=') {
            (Relation::Eq, v)
        } else {
            // `at` points at an operator character by construction
            unreachable!()
        };

    ensure!(
        !name.is_empty() && !version.is_empty() && !version.contains(OPERATOR_CHARS),
        MalformedExpressionSnafu { expr }
    );

    Ok(RangeExpr {
        name: name.to_owned(),
        rel: build(Version(version.to_owned())),
    })
}

/// Parse a signed constraint: `+<expr>` (must install) or `-<expr>` (must not
/// be installed).
pub fn parse_constraint(constraint: &str) -> Result<Constraint, ResolutionError> {
    let (sign, expr) = if let Some(rest) = constraint.strip_prefix('+') {
        (Sign::Install, rest)
    } else if let Some(rest) = constraint.strip_prefix('-') {
        (Sign::Forbid, rest)
    } else {
        return MalformedConstraintSnafu { constraint }.fail();
    };
    Ok(Constraint {
        sign,
        expr: parse_range(expr)?,
    })
}

/// Parse the repository document: a JSON array of package records. Absent
/// `depends`/`conflicts` are treated as empty.
pub fn parse_repository(doc: &str) -> Result<Repository, ResolutionError> {
    let records: Vec<PackageRecord> =
        serde_json::from_str(doc).context(MalformedDocumentSnafu)?;

    let mut repository = Repository::new();
    for record in records {
        let mut depends = Vec::with_capacity(record.depends.len());
        for clause in &record.depends {
            depends.push(
                clause
                    .iter()
                    .map(|e| parse_range(e))
                    .collect::<Result<Vec<_>, _>>()?,
            );
        }
        let conflicts = record
            .conflicts
            .iter()
            .map(|e| parse_range(e))
            .collect::<Result<Vec<_>, _>>()?;

        repository.insert(Package {
            name: record.name,
            version: Version(record.version),
            size: record.size,
            depends,
            conflicts,
        });
    }
    Ok(repository)
}

/// Parse the initial document: a JSON array of concrete ids.
pub fn parse_initial(doc: &str) -> Result<Vec<PackageId>, ResolutionError> {
    serde_json::from_str(doc).context(MalformedDocumentSnafu)
}

/// Parse the constraints document: a JSON array of signed expressions.
pub fn parse_constraints(doc: &str) -> Result<Vec<Constraint>, ResolutionError> {
    let raw: Vec<String> = serde_json::from_str(doc).context(MalformedDocumentSnafu)?;
    raw.iter().map(|c| parse_constraint(c)).collect()
}

/// Parse all three documents and assemble a validated [`Problem`].
pub fn parse_problem(
    repository: &str,
    initial: &str,
    constraints: &str,
) -> Result<Problem, ResolutionError> {
    let repository = parse_repository(repository)?;
    let initial = parse_initial(initial)?;
    let constraints = parse_constraints(constraints)?;
    Problem::new(repository, initial, &constraints)
}
