use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::value::Value;

/// A registered custom predicate: pure function of the value at a path.
pub type PredicateFn = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Clock override used when resolving relative date phrases (`now`,
/// `yesterday`, ...) during validation.
pub type NowFn = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Options for configuring the [`Validator`](crate::Validator) at
/// construction time.
#[non_exhaustive]
pub enum ValidatorOption {
    /// Stop validation on the first violation instead of collecting all.
    FailFast,

    /// Override the clock used for relative date phrases and temporal rules.
    NowFn(NowFn),

    /// Register a named custom predicate. Constraints of kind
    /// [`Predicate`](crate::ConstraintKind::Predicate) refer to it by name;
    /// compiling a set that names an unregistered predicate fails.
    Predicate(String, PredicateFn),
}

/// Options for configuring a single `Validator::validate_with` call.
#[non_exhaustive]
pub enum ValidationOption {
    /// Stop validation on the first violation instead of collecting all.
    FailFast,

    /// Override the clock for this validation call.
    NowFn(NowFn),
}

/// Runtime configuration passed to checks during validation.
#[derive(Clone)]
pub(crate) struct ValidationConfig {
    pub fail_fast: bool,
    pub now_fn: NowFn,
}

/// Default clock.
///
/// Shared by `ValidationConfig::default()` and `Validator::with_options()`.
pub(crate) fn default_now_fn() -> NowFn {
    Arc::new(Utc::now)
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            fail_fast: false,
            now_fn: default_now_fn(),
        }
    }
}
