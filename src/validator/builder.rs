use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, RwLock};

use tracing::{debug, trace};

use crate::config::PredicateFn;
use crate::constraint::{Constraint, ConstraintKind, ConstraintSet};
use crate::error::{ConstraintSetError, Error};
use crate::path::Path;

use super::checks::CompiledCheck;
use super::evaluator::{ConstraintEval, SetEval};

/// Build-through cache of compiled constraint sets keyed by structural
/// identity.
pub(crate) struct Builder {
    /// Serializes cache writes.
    build_lock: Mutex<()>,
    /// Compiled-set cache.
    cache: RwLock<HashMap<ConstraintSet, Arc<SetEval>>>,
    /// Named predicates registered at validator construction.
    predicates: HashMap<String, PredicateFn>,
    #[cfg(test)]
    compile_count: std::sync::atomic::AtomicUsize,
}

impl Builder {
    fn read_cache(&self) -> std::sync::RwLockReadGuard<'_, HashMap<ConstraintSet, Arc<SetEval>>> {
        self.cache
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write_cache(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<ConstraintSet, Arc<SetEval>>> {
        self.cache
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn lock_build(&self) -> std::sync::MutexGuard<'_, ()> {
        self.build_lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn new() -> Self {
        Self::with_predicates(HashMap::new())
    }

    pub fn with_predicates(predicates: HashMap<String, PredicateFn>) -> Self {
        Self {
            build_lock: Mutex::new(()),
            cache: RwLock::new(HashMap::new()),
            predicates,
            #[cfg(test)]
            compile_count: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Load a cached compiled set or compile a new one.
    ///
    /// Structurally equal sets map to the same cached artifact, so each
    /// distinct set compiles exactly once per builder regardless of how many
    /// threads race on it.
    pub fn load_or_build(&self, set: &ConstraintSet) -> Result<Arc<SetEval>, Error> {
        // Fast path
        {
            let cache = self.read_cache();
            if let Some(eval) = cache.get(set) {
                trace!(fingerprint = set.fingerprint(), "constraint set cache hit");
                return Ok(Arc::clone(eval));
            }
        }

        // Slow path
        let _guard = self.lock_build();

        {
            let cache = self.read_cache();
            if let Some(eval) = cache.get(set) {
                return Ok(Arc::clone(eval));
            }
        }

        let eval = Arc::new(self.compile(set)?);
        debug!(
            fingerprint = set.fingerprint(),
            constraints = set.constraints().len(),
            "compiled constraint set"
        );
        self.write_cache().insert(set.clone(), Arc::clone(&eval));

        Ok(eval)
    }

    fn compile(&self, set: &ConstraintSet) -> Result<SetEval, Error> {
        #[cfg(test)]
        self.compile_count
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);

        check_cardinality_conflicts(set.constraints())?;

        let mut evals = Vec::with_capacity(set.constraints().len());
        for constraint in set.constraints() {
            if let Some(shape) = set.shape() {
                check_path_in_shape(constraint.path(), shape)?;
            }
            evals.push(ConstraintEval {
                path: constraint.path().clone(),
                check: CompiledCheck::compile(constraint.kind(), &self.predicates)?,
                template: constraint.message().map(str::to_string),
            });
        }

        Ok(SetEval::new(evals))
    }

    #[cfg(test)]
    pub fn cache_len(&self) -> usize {
        self.read_cache().len()
    }

    #[cfg(test)]
    pub fn compile_count(&self) -> usize {
        self.compile_count.load(std::sync::atomic::Ordering::Relaxed)
    }
}

/// `required` and `absent` on one path contradict each other; reject the set
/// instead of letting one of them always fail at run time.
fn check_cardinality_conflicts(constraints: &[Constraint]) -> Result<(), ConstraintSetError> {
    let mut required: BTreeSet<&Path> = BTreeSet::new();
    let mut absent: BTreeSet<&Path> = BTreeSet::new();

    for constraint in constraints {
        match constraint.kind() {
            ConstraintKind::Required => {
                required.insert(constraint.path());
            }
            ConstraintKind::Absent => {
                absent.insert(constraint.path());
            }
            _ => {}
        }
    }

    if let Some(path) = required.intersection(&absent).next() {
        return Err(ConstraintSetError {
            cause: format!("`{path}` is declared both required and absent"),
        });
    }
    Ok(())
}

/// A shape entry admits either the exact path or, by root key, its whole
/// subtree. Root paths (whole-graph predicates) are always admitted.
fn check_path_in_shape(path: &Path, shape: &BTreeSet<String>) -> Result<(), ConstraintSetError> {
    if path.is_root() || shape.contains(&path.to_string()) {
        return Ok(());
    }
    if path.root_key().is_some_and(|key| shape.contains(key)) {
        return Ok(());
    }
    Err(ConstraintSetError {
        cause: format!("constraint path `{path}` is outside the declared shape"),
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::value::Value;

    fn constraint(path: &str, kind: ConstraintKind) -> Constraint {
        Constraint::new(path, kind).expect("constraint must define")
    }

    #[test]
    fn structurally_equal_sets_share_one_compiled_artifact() {
        let builder = Builder::new();
        let build_set = || {
            ConstraintSet::new([
                constraint("age", ConstraintKind::Required),
                constraint("age", ConstraintKind::range(Value::Int(0), Value::Int(120))),
            ])
        };

        let first = builder
            .load_or_build(&build_set())
            .expect("set must compile");
        let second = builder
            .load_or_build(&build_set())
            .expect("set must compile");

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(builder.cache_len(), 1);
    }

    #[test]
    fn required_and_absent_on_one_path_cannot_compile() {
        let builder = Builder::new();
        let set = ConstraintSet::new([
            constraint("legacy_id", ConstraintKind::Required),
            constraint("legacy_id", ConstraintKind::Absent),
        ]);

        let err = builder.load_or_build(&set).expect_err("conflicting set");
        assert!(matches!(err, Error::ConstraintSet(_)));
        assert!(err.to_string().contains("legacy_id"));
    }

    #[test]
    fn declared_shape_rejects_unknown_paths() {
        let builder = Builder::new();
        let set = ConstraintSet::new([constraint("name", ConstraintKind::Required)])
            .with_shape(["age", "user"]);

        let err = builder.load_or_build(&set).expect_err("path outside shape");
        assert!(err.to_string().contains("outside the declared shape"));

        let nested = ConstraintSet::new([constraint(
            "user.email",
            ConstraintKind::pattern("@"),
        )])
        .with_shape(["age", "user"]);
        assert!(builder.load_or_build(&nested).is_ok());
    }

    #[test]
    fn failed_compilation_is_not_cached() {
        let builder = Builder::new();
        let set = ConstraintSet::new([constraint("x", ConstraintKind::predicate("missing"))]);

        assert!(builder.load_or_build(&set).is_err());
        assert_eq!(builder.cache_len(), 0);
    }
}
