//! Range resolution and repository expansion: every `A>=2`-style expression
//! is rewritten into the set of concrete ids it denotes, leaving nothing but
//! atomic references for the formula builder.

use crate::types::{PackageId, RangeExpr, Repository};
use indexmap::{IndexMap, IndexSet};
use itertools::Itertools;
use log::debug;
use std::collections::HashMap;
use std::rc::Rc;

/// Resolves range expressions against one repository. The memo cache lives
/// and dies with the resolver; independent runs never share state.
pub struct Resolver<'r> {
    repository: &'r Repository,
    cache: HashMap<RangeExpr, Rc<Vec<PackageId>>>,
}

impl<'r> Resolver<'r> {
    pub fn new(repository: &'r Repository) -> Self {
        Resolver {
            repository,
            cache: HashMap::new(),
        }
    }

    /// All ids of `expr.name` whose version satisfies `expr.rel`. Unknown
    /// names resolve to the empty set.
    pub fn resolve(&mut self, expr: &RangeExpr) -> Rc<Vec<PackageId>> {
        if let Some(hit) = self.cache.get(expr) {
            return Rc::clone(hit);
        }
        let ids = self
            .repository
            .versions_of(&expr.name)
            .iter()
            .filter(|(version, _)| expr.rel.matches(version))
            .map(|(_, id)| id.clone())
            .collect_vec();
        let ids = Rc::new(ids);
        self.cache.insert(expr.clone(), Rc::clone(&ids));
        ids
    }
}

/// A package whose dependency clauses and conflicts hold concrete ids only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroundPackage {
    pub id: PackageId,
    pub size: u64,
    pub depends: Vec<Vec<PackageId>>,
    pub conflicts: Vec<PackageId>,
}

#[derive(Debug, Clone, Default)]
pub struct GroundRepository {
    pub packages: IndexMap<PackageId, GroundPackage>,
}

/// Rewrite every range expression in the repository into the ids it denotes.
/// A clause is the union of its alternatives' resolutions; a clause over only
/// unknown references becomes empty, which later pins its owner to 0.
pub fn expand(repository: &Repository) -> GroundRepository {
    let mut resolver = Resolver::new(repository);
    let mut packages = IndexMap::with_capacity(repository.len());

    for package in repository.packages() {
        let depends = package
            .depends
            .iter()
            .map(|clause| {
                let mut alternatives = IndexSet::new();
                for expr in clause {
                    alternatives.extend(resolver.resolve(expr).iter().cloned());
                }
                alternatives.into_iter().collect_vec()
            })
            .collect_vec();

        let mut conflicts = IndexSet::new();
        for expr in &package.conflicts {
            conflicts.extend(resolver.resolve(expr).iter().cloned());
        }

        let ground = GroundPackage {
            id: package.id(),
            size: package.size,
            depends,
            conflicts: conflicts.into_iter().collect_vec(),
        };
        packages.insert(ground.id.clone(), ground);
    }

    debug!(
        "expanded {} packages over {} distinct range expressions",
        packages.len(),
        resolver.cache.len()
    );
    GroundRepository { packages }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::parse::parse_range;
    use crate::types::{Package, Version};

    fn pkg(name: &str, version: &str) -> Package {
        Package {
            name: name.to_owned(),
            version: Version::from(version),
            size: 1,
            depends: vec![],
            conflicts: vec![],
        }
    }

    fn abc_repo() -> Repository {
        [pkg("A", "1"), pkg("A", "2"), pkg("A", "3"), pkg("B", "1")]
            .into_iter()
            .collect()
    }

    fn resolve(repository: &Repository, expr: &str) -> Vec<PackageId> {
        let mut resolver = Resolver::new(repository);
        resolver.resolve(&parse_range(expr).unwrap()).to_vec()
    }

    #[test]
    fn resolve_per_operator() {
        let repository = abc_repo();
        assert_eq!(resolve(&repository, "A"), ["A=1", "A=2", "A=3"]);
        assert_eq!(resolve(&repository, "A=2"), ["A=2"]);
        assert_eq!(resolve(&repository, "A<2"), ["A=1"]);
        assert_eq!(resolve(&repository, "A<=2"), ["A=1", "A=2"]);
        assert_eq!(resolve(&repository, "A>2"), ["A=3"]);
        assert_eq!(resolve(&repository, "A>=2"), ["A=2", "A=3"]);
        assert_eq!(resolve(&repository, "A>3"), Vec::<PackageId>::new());
    }

    #[test]
    fn unknown_name_resolves_to_nothing() {
        let repository = abc_repo();
        assert!(resolve(&repository, "missing").is_empty());
        assert!(resolve(&repository, "missing>=1").is_empty());
    }

    #[test]
    fn lexical_ordering_drives_resolution() {
        // versions "10" and "9": lexically "10" < "5" < "9"
        let repository: Repository = [pkg("A", "10"), pkg("A", "9")].into_iter().collect();
        assert_eq!(resolve(&repository, "A>5"), ["A=9"]);
        assert_eq!(resolve(&repository, "A<5"), ["A=10"]);
    }

    #[test]
    fn repeated_literals_hit_the_cache() {
        let repository = abc_repo();
        let mut resolver = Resolver::new(&repository);
        let expr = parse_range("A>=2").unwrap();
        let first = resolver.resolve(&expr);
        let second = resolver.resolve(&expr);
        assert!(Rc::ptr_eq(&first, &second));
    }

    #[test]
    fn clause_expansion_unions_alternatives() {
        let mut a = pkg("A", "1");
        a.depends = vec![vec![
            parse_range("B>=1").unwrap(),
            parse_range("B=2").unwrap(),
        ]];
        let repository: Repository = [a, pkg("B", "1"), pkg("B", "2")].into_iter().collect();

        let ground = expand(&repository);
        // B=2 matches both alternatives but appears once
        assert_eq!(ground.packages["A=1"].depends, vec![vec!["B=1", "B=2"]]);
    }

    #[test]
    fn conflicts_expand_and_dedup() {
        let mut a = pkg("A", "1");
        a.conflicts = vec![parse_range("B").unwrap(), parse_range("B=2").unwrap()];
        let repository: Repository = [a, pkg("B", "1"), pkg("B", "2")].into_iter().collect();

        let ground = expand(&repository);
        assert_eq!(ground.packages["A=1"].conflicts, ["B=1", "B=2"]);
    }

    #[test]
    fn unknown_references_leave_empty_clauses() {
        let mut a = pkg("A", "1");
        a.depends = vec![vec![parse_range("missing").unwrap()]];
        a.conflicts = vec![parse_range("also-missing").unwrap()];
        let repository: Repository = [a].into_iter().collect();

        let ground = expand(&repository);
        assert_eq!(ground.packages["A=1"].depends, vec![Vec::<PackageId>::new()]);
        assert!(ground.packages["A=1"].conflicts.is_empty());
    }

    #[test]
    fn expansion_is_total() {
        let mut a = pkg("A", "1");
        a.depends = vec![
            vec![parse_range("B").unwrap(), parse_range("missing").unwrap()],
            vec![parse_range("A>=1").unwrap()],
        ];
        a.conflicts = vec![parse_range("B<2").unwrap()];
        let repository: Repository = [a, pkg("B", "1"), pkg("B", "2")].into_iter().collect();

        let ground = expand(&repository);
        for package in ground.packages.values() {
            for clause in &package.depends {
                for id in clause {
                    assert!(repository.contains(id), "{id} is not a concrete id");
                }
            }
            for id in &package.conflicts {
                assert!(repository.contains(id), "{id} is not a concrete id");
            }
        }
    }

    mod properties {
        use super::*;
        use crate::types::Relation;
        use proptest::collection::btree_set;
        use proptest::prelude::*;
        use proptest::sample::select;

        const NAMES: &[&str] = &["alpha", "beta", "gamma", "delta", "omega"];
        const VERSIONS: &[&str] = &["1", "2", "3", "9", "10"];

        fn version() -> impl Strategy<Value = Version> {
            select(VERSIONS).prop_map(Version::from)
        }

        fn relation() -> impl Strategy<Value = Relation> {
            prop_oneof![
                Just(Relation::Any),
                version().prop_map(Relation::Eq),
                version().prop_map(Relation::Lt),
                version().prop_map(Relation::Le),
                version().prop_map(Relation::Gt),
                version().prop_map(Relation::Ge),
            ]
        }

        fn repo() -> impl Strategy<Value = Repository> {
            btree_set((select(NAMES), select(VERSIONS)), 0..12)
                .prop_map(|keys| keys.into_iter().map(|(n, v)| pkg(n, v)).collect())
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 64,
                .. ProptestConfig::default()
            })]
            #[test]
            fn resolution_matches_bruteforce(
                repository in repo(),
                name in select(NAMES),
                rel in relation(),
            ) {
                let expr = RangeExpr { name: name.to_owned(), rel };
                let mut resolver = Resolver::new(&repository);
                let resolved = resolver.resolve(&expr);
                for package in repository.packages() {
                    let expected =
                        package.name == expr.name && expr.rel.matches(&package.version);
                    prop_assert_eq!(resolved.contains(&package.id()), expected);
                }
            }
        }
    }
}
