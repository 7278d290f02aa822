use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use snafu::{prelude::*, Backtrace};
use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};

/// Concrete package reference, `name=version`, unique within a repository.
pub type PackageId = String;

pub type Res = Result<Resolution, ResolutionError>;

/// Opaque version token. The ordering is byte-wise lexicographic on the raw
/// token, not numeric: `"9" > "10"`. Callers that want numeric ordering must
/// zero-pad their tokens.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(pub String);

impl Display for Version {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Version {
    fn from(s: &str) -> Self {
        Version(s.to_owned())
    }
}

/// Version comparison of a range expression, fixed once at parse time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Relation {
    Any,
    Eq(Version),
    Lt(Version),
    Le(Version),
    Gt(Version),
    Ge(Version),
}

impl Relation {
    pub fn matches(&self, candidate: &Version) -> bool {
        match self {
            Relation::Any => true,
            Relation::Eq(v) => candidate == v,
            Relation::Lt(v) => candidate < v,
            Relation::Le(v) => candidate <= v,
            Relation::Gt(v) => candidate > v,
            Relation::Ge(v) => candidate >= v,
        }
    }
}

/// A package name plus an optional version comparison, denoting the set of
/// concrete packages it matches.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RangeExpr {
    pub name: String,
    pub rel: Relation,
}

impl Display for RangeExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.rel {
            Relation::Any => write!(f, "{}", self.name),
            Relation::Eq(v) => write!(f, "{}={v}", self.name),
            Relation::Lt(v) => write!(f, "{}<{v}", self.name),
            Relation::Le(v) => write!(f, "{}<={v}", self.name),
            Relation::Gt(v) => write!(f, "{}>{v}", self.name),
            Relation::Ge(v) => write!(f, "{}>={v}", self.name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    Install,
    Forbid,
}

/// One user constraint: a signed range expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    pub sign: Sign,
    pub expr: RangeExpr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    pub name: String,
    pub version: Version,
    pub size: u64,
    /// Conjunction of clauses; each clause is a disjunction of alternatives.
    pub depends: Vec<Vec<RangeExpr>>,
    pub conflicts: Vec<RangeExpr>,
}

impl Package {
    pub fn id(&self) -> PackageId {
        format!("{}={}", self.name, self.version)
    }
}

/// All packages of a problem instance, keyed by id in insertion order, with a
/// name grouping used only during range resolution.
#[derive(Debug, Clone, Default)]
pub struct Repository {
    packages: IndexMap<PackageId, Package>,
    by_name: HashMap<String, Vec<(Version, PackageId)>>,
}

impl Repository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a package. The first record for an id wins; a duplicate is
    /// dropped and `false` is returned.
    pub fn insert(&mut self, package: Package) -> bool {
        let id = package.id();
        if self.packages.contains_key(&id) {
            return false;
        }
        self.by_name
            .entry(package.name.clone())
            .or_default()
            .push((package.version.clone(), id.clone()));
        self.packages.insert(id, package);
        true
    }

    pub fn get(&self, id: &str) -> Option<&Package> {
        self.packages.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.packages.contains_key(id)
    }

    /// Every version of `name` as `(version, id)` pairs, in insertion order.
    /// Unknown names yield an empty slice.
    pub fn versions_of(&self, name: &str) -> &[(Version, PackageId)] {
        self.by_name.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn packages(&self) -> impl Iterator<Item = &Package> {
        self.packages.values()
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

impl FromIterator<Package> for Repository {
    fn from_iter<T: IntoIterator<Item = Package>>(iter: T) -> Self {
        let mut repository = Repository::new();
        for package in iter {
            repository.insert(package);
        }
        repository
    }
}

// Underscores are outside the range-expression alphabet, so no expression in
// any document can ever reference this name.
pub(crate) const GOAL_NAME: &str = "_goal_";

/// A validated problem instance: the repository (synthetic goal included),
/// the initially installed set, and the goal's id.
#[derive(Debug, Clone)]
pub struct Problem {
    pub repository: Repository,
    pub initial: IndexSet<PackageId>,
    pub goal_id: PackageId,
}

impl Problem {
    /// Validate the initial set and graft the synthetic goal package onto the
    /// repository. Force-installing the goal is what makes every user
    /// constraint hold.
    pub fn new(
        mut repository: Repository,
        initial: impl IntoIterator<Item = PackageId>,
        constraints: &[Constraint],
    ) -> Result<Problem, ResolutionError> {
        let mut initial_set = IndexSet::new();
        for id in initial {
            ensure!(repository.contains(&id), UnknownInitialSnafu { id });
            initial_set.insert(id);
        }

        let goal = goal_package(&repository, constraints);
        let goal_id = goal.id();
        let fresh = repository.insert(goal);
        debug_assert!(fresh, "goal name reservation failed");

        Ok(Problem {
            repository,
            initial: initial_set,
            goal_id,
        })
    }
}

/// Each `+` constraint becomes its own single-alternative dependency clause;
/// each `-` constraint joins the goal's conflicts.
fn goal_package(repository: &Repository, constraints: &[Constraint]) -> Package {
    let mut name = String::from(GOAL_NAME);
    while !repository.versions_of(&name).is_empty() {
        name.push('_');
    }

    let mut depends = Vec::new();
    let mut conflicts = Vec::new();
    for constraint in constraints {
        match constraint.sign {
            Sign::Install => depends.push(vec![constraint.expr.clone()]),
            Sign::Forbid => conflicts.push(constraint.expr.clone()),
        }
    }

    Package {
        name,
        version: Version("1".into()),
        size: 0,
        depends,
        conflicts,
    }
}

/// One signed step of a plan. `Display` renders `+id` / `-id`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Action {
    Install(PackageId),
    Remove(PackageId),
}

impl Display for Action {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Action::Install(id) => write!(f, "+{id}"),
            Action::Remove(id) => write!(f, "-{id}"),
        }
    }
}

/// Terminal outcome of a resolution run. `Unsat` is an expected result, not
/// an error; engine failures surface as [`ResolutionError`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Sat { actions: Vec<Action> },
    Unsat,
}

impl Resolution {
    pub fn is_sat(&self) -> bool {
        matches!(self, Resolution::Sat { .. })
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ResolutionError {
    #[snafu(display("Malformed range expression: {expr:?}"))]
    MalformedExpression { expr: String, backtrace: Backtrace },
    #[snafu(display("Malformed constraint: {constraint:?} (expected a leading '+' or '-')"))]
    MalformedConstraint {
        constraint: String,
        backtrace: Backtrace,
    },
    #[snafu(display("Malformed document: {source}"))]
    MalformedDocument {
        source: serde_json::Error,
        backtrace: Backtrace,
    },
    #[snafu(display("Initial package {id:?} does not exist in the repository"))]
    UnknownInitial { id: PackageId, backtrace: Backtrace },
    #[snafu(display("Solver failure: {reason}"))]
    SolverFailure { reason: String, backtrace: Backtrace },
}
