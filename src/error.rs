use crate::report::Violation;

/// Top-level error type for constraint definition and compilation.
///
/// Both variants are caller bugs (malformed definitions), surfaced
/// immediately and not retryable. Data-quality problems found while
/// validating a graph are never raised through this type — they become
/// [`Violation`](crate::Violation)s in the report instead.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A single constraint definition was malformed.
    #[error(transparent)]
    Constraint(#[from] InvalidConstraintError),

    /// A constraint set conflicts with itself or cannot be compiled.
    #[error(transparent)]
    ConstraintSet(#[from] ConstraintSetError),
}

/// Returned when constraint parameters do not match the arity or type
/// expected by the constraint kind.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid constraint: {cause}")]
pub struct InvalidConstraintError {
    /// Description of why the constraint definition was rejected.
    pub cause: String,
}

/// Returned when a constraint set cannot be compiled: contradictory
/// constraints on one path, paths outside the declared shape, or an
/// unregistered predicate.
#[derive(Debug, Clone, thiserror::Error)]
#[error("constraint set error: {cause}")]
pub struct ConstraintSetError {
    /// Description of why the set failed to compile.
    pub cause: String,
}

/// Merge violations from a sub-evaluation into an accumulator.
///
/// Returns whether evaluation should continue. With `fail_fast` set, the
/// first violation stops the run.
pub(crate) fn merge_violations(
    acc: &mut Vec<Violation>,
    new: Vec<Violation>,
    fail_fast: bool,
) -> bool {
    let had_new = !new.is_empty();
    acc.extend(new);
    !(fail_fast && had_new)
}
