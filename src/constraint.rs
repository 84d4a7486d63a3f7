//! The constraint model: immutable rule descriptions and ordered sets.
//!
//! Constraints are pure data. All parameter checking happens at definition
//! time ([`Constraint::new`]) so that compilation and validation never meet a
//! malformed rule.

use std::collections::BTreeSet;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::error::InvalidConstraintError;
use crate::path::Path;
use crate::value::Value;

/// The predicate kind of a single constraint, with its parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ConstraintKind {
    /// The path must resolve to a present, non-null value.
    Required,

    /// The path must be absent or null. The cardinality dual of `Required`;
    /// declaring both on one path makes the set uncompilable.
    Absent,

    /// The value must fall within `[min, max]` (inclusive, either bound
    /// optional). Bounds must share a comparable type: numeric, timestamp,
    /// or string. String input at the path is normalized first — as a date
    /// for timestamp bounds, as a numeric expression for numeric bounds.
    Range {
        /// Inclusive lower bound.
        min: Option<Value>,
        /// Inclusive upper bound.
        max: Option<Value>,
    },

    /// A string value must match this regular expression.
    Pattern(String),

    /// The element count (strings: characters, lists/maps: entries) must
    /// fall within `[min, max]`.
    Length {
        /// Inclusive minimum count.
        min: Option<u64>,
        /// Inclusive maximum count.
        max: Option<u64>,
    },

    /// The value must equal one of these values.
    InSet(Vec<Value>),

    /// A custom predicate registered on the validator under this name.
    Predicate(String),
}

impl ConstraintKind {
    /// A two-sided inclusive range.
    #[must_use]
    pub fn range(min: impl Into<Value>, max: impl Into<Value>) -> Self {
        ConstraintKind::Range {
            min: Some(min.into()),
            max: Some(max.into()),
        }
    }

    /// A lower-bounded range.
    #[must_use]
    pub fn min(min: impl Into<Value>) -> Self {
        ConstraintKind::Range {
            min: Some(min.into()),
            max: None,
        }
    }

    /// An upper-bounded range.
    #[must_use]
    pub fn max(max: impl Into<Value>) -> Self {
        ConstraintKind::Range {
            min: None,
            max: Some(max.into()),
        }
    }

    /// A regular-expression pattern constraint.
    #[must_use]
    pub fn pattern(pattern: impl Into<String>) -> Self {
        ConstraintKind::Pattern(pattern.into())
    }

    /// An element-count constraint.
    #[must_use]
    pub fn length(min: impl Into<Option<u64>>, max: impl Into<Option<u64>>) -> Self {
        ConstraintKind::Length {
            min: min.into(),
            max: max.into(),
        }
    }

    /// A membership constraint.
    #[must_use]
    pub fn in_set(values: impl IntoIterator<Item = Value>) -> Self {
        ConstraintKind::InSet(values.into_iter().collect())
    }

    /// A named custom predicate constraint.
    #[must_use]
    pub fn predicate(name: impl Into<String>) -> Self {
        ConstraintKind::Predicate(name.into())
    }

    /// The kind's stable name, used as the violation kind prefix.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ConstraintKind::Required => "required",
            ConstraintKind::Absent => "absent",
            ConstraintKind::Range { .. } => "range",
            ConstraintKind::Pattern(_) => "pattern",
            ConstraintKind::Length { .. } => "length",
            ConstraintKind::InSet(_) => "in",
            ConstraintKind::Predicate(_) => "predicate",
        }
    }
}

/// How a range compares its bounds, fixed at definition time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BoundType {
    Numeric,
    Temporal,
    Text,
}

fn bound_type(value: &Value) -> Option<BoundType> {
    match value {
        Value::Int(_) | Value::Float(_) => Some(BoundType::Numeric),
        Value::Timestamp(_) => Some(BoundType::Temporal),
        Value::String(_) => Some(BoundType::Text),
        _ => None,
    }
}

/// A single declarative validation rule bound to a value path.
///
/// Immutable once created; owned by a [`ConstraintSet`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Constraint {
    path: Path,
    kind: ConstraintKind,
    message: Option<String>,
}

impl Constraint {
    /// Define a constraint on `path`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidConstraintError`] when the path does not parse or the
    /// kind's parameters do not satisfy its contract (see
    /// [`ConstraintKind`]).
    pub fn new(path: &str, kind: ConstraintKind) -> Result<Self, InvalidConstraintError> {
        let path: Path = path.parse()?;
        if path.is_root() && !matches!(kind, ConstraintKind::Predicate(_)) {
            return Err(InvalidConstraintError {
                cause: format!("`{}` constraint requires a non-root path", kind.name()),
            });
        }
        validate_kind(&kind)?;
        Ok(Self {
            path,
            kind,
            message: None,
        })
    }

    /// Attach a message template. `{path}` and `{value}` placeholders are
    /// expanded when a violation is reported.
    #[must_use]
    pub fn with_message(mut self, template: impl Into<String>) -> Self {
        self.message = Some(template.into());
        self
    }

    /// The path this constraint targets.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The constraint kind with its parameters.
    #[must_use]
    pub fn kind(&self) -> &ConstraintKind {
        &self.kind
    }

    /// The message template, if one was attached.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

fn validate_kind(kind: &ConstraintKind) -> Result<(), InvalidConstraintError> {
    match kind {
        ConstraintKind::Required | ConstraintKind::Absent => Ok(()),
        ConstraintKind::Range { min, max } => validate_range(min.as_ref(), max.as_ref()),
        ConstraintKind::Pattern(pattern) => {
            regex::Regex::new(pattern)
                .map_err(|err| InvalidConstraintError {
                    cause: format!("invalid pattern `{pattern}`: {err}"),
                })?;
            Ok(())
        }
        ConstraintKind::Length { min, max } => {
            if min.is_none() && max.is_none() {
                return Err(InvalidConstraintError {
                    cause: "length constraint requires at least one bound".to_string(),
                });
            }
            if let (Some(min), Some(max)) = (min, max) {
                if min > max {
                    return Err(InvalidConstraintError {
                        cause: format!("length bounds are reversed: {min} > {max}"),
                    });
                }
            }
            Ok(())
        }
        ConstraintKind::InSet(values) => {
            if values.is_empty() {
                return Err(InvalidConstraintError {
                    cause: "in-set constraint requires at least one value".to_string(),
                });
            }
            if values.iter().any(Value::is_null) {
                return Err(InvalidConstraintError {
                    cause: "in-set constraint may not contain null; use `required`".to_string(),
                });
            }
            Ok(())
        }
        ConstraintKind::Predicate(name) => {
            if name.is_empty() {
                return Err(InvalidConstraintError {
                    cause: "predicate constraint requires a name".to_string(),
                });
            }
            Ok(())
        }
    }
}

fn validate_range(min: Option<&Value>, max: Option<&Value>) -> Result<(), InvalidConstraintError> {
    let min_type = min.map(classify_bound).transpose()?;
    let max_type = max.map(classify_bound).transpose()?;

    match (min_type, max_type) {
        (None, None) => Err(InvalidConstraintError {
            cause: "range constraint requires at least one bound".to_string(),
        }),
        (Some(lo), Some(hi)) if lo != hi => Err(InvalidConstraintError {
            cause: format!(
                "range bounds must share a type: min is {}, max is {}",
                type_label(lo),
                type_label(hi)
            ),
        }),
        (Some(_), Some(_)) => {
            let (min, max) = (min.unwrap_or(&Value::Null), max.unwrap_or(&Value::Null));
            if bounds_reversed(min, max) {
                return Err(InvalidConstraintError {
                    cause: format!("range bounds are reversed: {min} > {max}"),
                });
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn classify_bound(value: &Value) -> Result<BoundType, InvalidConstraintError> {
    if let Value::Float(f) = value {
        if !f.is_finite() {
            return Err(InvalidConstraintError {
                cause: format!("range bound must be finite, got {f}"),
            });
        }
    }
    bound_type(value).ok_or_else(|| InvalidConstraintError {
        cause: format!(
            "range bound must be numeric, timestamp, or string, got {}",
            value.type_name()
        ),
    })
}

fn bounds_reversed(min: &Value, max: &Value) -> bool {
    match (min, max) {
        (Value::String(lo), Value::String(hi)) => lo > hi,
        (Value::Timestamp(lo), Value::Timestamp(hi)) => lo > hi,
        (Value::Int(lo), Value::Int(hi)) => lo > hi,
        _ => match (min.as_float(), max.as_float()) {
            (Some(lo), Some(hi)) => lo > hi,
            _ => false,
        },
    }
}

fn type_label(bound: BoundType) -> &'static str {
    match bound {
        BoundType::Numeric => "numeric",
        BoundType::Temporal => "timestamp",
        BoundType::Text => "string",
    }
}

/// The ordered, immutable collection of constraints governing one value
/// shape.
///
/// Identity is structural: two sets with equal constraints (and equal
/// declared shapes) are the same set, hash to the same key, and share one
/// compiled validator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ConstraintSet {
    constraints: Vec<Constraint>,
    shape: Option<BTreeSet<String>>,
}

impl ConstraintSet {
    /// Build a set from constraints in declaration order.
    pub fn new(constraints: impl IntoIterator<Item = Constraint>) -> Self {
        Self {
            constraints: constraints.into_iter().collect(),
            shape: None,
        }
    }

    /// Declare the known paths of the value shape this set governs.
    ///
    /// With a shape declared, compiling a constraint whose path is not listed
    /// fails with a [`ConstraintSetError`](crate::ConstraintSetError).
    /// Without one, all paths are accepted.
    #[must_use]
    pub fn with_shape(mut self, paths: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.shape = Some(paths.into_iter().map(Into::into).collect());
        self
    }

    /// The constraints in declaration order.
    #[must_use]
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub(crate) fn shape(&self) -> Option<&BTreeSet<String>> {
        self.shape.as_ref()
    }

    /// A stable hash of the set's structural content, used as the
    /// compiled-validator cache key and in diagnostics.
    #[must_use]
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

impl FromIterator<Constraint> for ConstraintSet {
    fn from_iter<I: IntoIterator<Item = Constraint>>(iter: I) -> Self {
        Self::new(iter)
    }
}
