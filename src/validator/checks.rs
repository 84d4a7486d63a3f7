use std::collections::HashMap;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::config::PredicateFn;
use crate::constraint::ConstraintKind;
use crate::error::ConstraintSetError;
use crate::normalize::{self, Expect, NormalizedValue};
use crate::value::Value;

/// A constraint kind compiled into its runtime form: regexes built, range
/// bounds normalized, predicates resolved to functions.
pub(crate) enum CompiledCheck {
    Required,
    Absent,
    NumericRange {
        min: Option<NumericBound>,
        max: Option<NumericBound>,
    },
    TemporalRange {
        min: Option<DateTime<Utc>>,
        max: Option<DateTime<Utc>>,
    },
    TextRange {
        min: Option<String>,
        max: Option<String>,
    },
    Pattern(Regex),
    Length {
        min: Option<u64>,
        max: Option<u64>,
    },
    InSet(Vec<Value>),
    Predicate {
        name: String,
        func: PredicateFn,
    },
}

/// A numeric range bound kept in its declared domain. Integer bounds compare
/// against integer values exactly; going through `f64` would collapse
/// neighbors above 2^53.
#[derive(Debug, Clone, Copy)]
pub(crate) enum NumericBound {
    Int(i64),
    Float(f64),
}

impl NumericBound {
    fn as_f64(self) -> f64 {
        match self {
            #[allow(clippy::cast_precision_loss)]
            NumericBound::Int(i) => i as f64,
            NumericBound::Float(f) => f,
        }
    }

    /// `value < self` for an integer value.
    fn int_below(self, value: i64) -> bool {
        match self {
            NumericBound::Int(bound) => value < bound,
            #[allow(clippy::cast_precision_loss)]
            NumericBound::Float(bound) => (value as f64) < bound,
        }
    }

    /// `value > self` for an integer value.
    fn int_above(self, value: i64) -> bool {
        match self {
            NumericBound::Int(bound) => value > bound,
            #[allow(clippy::cast_precision_loss)]
            NumericBound::Float(bound) => (value as f64) > bound,
        }
    }
}

impl std::fmt::Display for NumericBound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NumericBound::Int(i) => write!(f, "{i}"),
            NumericBound::Float(v) => write!(f, "{v}"),
        }
    }
}

/// Outcome of checking one value against one compiled check.
pub(crate) enum CheckResult {
    Pass,
    /// The check ran and the value failed it.
    Fail { kind: String, message: String },
    /// The value could not even be brought into the check's domain. The
    /// executor suppresses later checks on the same path after this.
    CannotNormalize {
        kind: &'static str,
        message: String,
    },
}

impl CompiledCheck {
    pub(crate) fn compile(
        kind: &ConstraintKind,
        predicates: &HashMap<String, PredicateFn>,
    ) -> Result<Self, ConstraintSetError> {
        match kind {
            ConstraintKind::Required => Ok(CompiledCheck::Required),
            ConstraintKind::Absent => Ok(CompiledCheck::Absent),
            ConstraintKind::Range { min, max } => compile_range(min.as_ref(), max.as_ref()),
            ConstraintKind::Pattern(pattern) => {
                let regex = Regex::new(pattern).map_err(|err| ConstraintSetError {
                    cause: format!("invalid pattern `{pattern}`: {err}"),
                })?;
                Ok(CompiledCheck::Pattern(regex))
            }
            ConstraintKind::Length { min, max } => Ok(CompiledCheck::Length {
                min: *min,
                max: *max,
            }),
            ConstraintKind::InSet(values) => Ok(CompiledCheck::InSet(values.clone())),
            ConstraintKind::Predicate(name) => {
                let func = predicates.get(name).ok_or_else(|| ConstraintSetError {
                    cause: format!("unknown predicate `{name}`"),
                })?;
                Ok(CompiledCheck::Predicate {
                    name: name.clone(),
                    func: func.clone(),
                })
            }
        }
    }

    pub(crate) fn is_required(&self) -> bool {
        matches!(self, CompiledCheck::Required)
    }

    /// Run the check. `value` is `None` when the path did not resolve.
    ///
    /// Only `Required` and `Absent` care about presence; every other check
    /// passes on a missing or null value so that optionality is expressed by
    /// one explicit `required` constraint instead of being implied by all.
    pub(crate) fn check(&self, value: Option<&Value>, now: DateTime<Utc>) -> CheckResult {
        match self {
            CompiledCheck::Required => match value {
                None | Some(Value::Null) => fail("required", "value is required"),
                Some(_) => CheckResult::Pass,
            },
            CompiledCheck::Absent => match value {
                None | Some(Value::Null) => CheckResult::Pass,
                Some(_) => fail("absent", "value must be absent"),
            },
            _ => match value {
                None => CheckResult::Pass,
                Some(Value::Null) => CheckResult::Pass,
                Some(value) => self.check_present(value, now),
            },
        }
    }

    fn check_present(&self, value: &Value, now: DateTime<Utc>) -> CheckResult {
        match self {
            CompiledCheck::Required | CompiledCheck::Absent => CheckResult::Pass,
            CompiledCheck::NumericRange { min, max } => {
                // Integer values compare in the integer domain; only floats
                // and expression strings go through `f64`.
                if let Value::Int(int_value) = value {
                    if let Some(min) = min {
                        if min.int_below(*int_value) {
                            return fail("range.min", format!("must be at least {min}"));
                        }
                    }
                    if let Some(max) = max {
                        if max.int_above(*int_value) {
                            return fail("range.max", format!("must be at most {max}"));
                        }
                    }
                    return CheckResult::Pass;
                }

                let number = match normalize::normalize_at(value, Expect::Number, now) {
                    Ok(NormalizedValue::Number(n)) => n,
                    Ok(_) => unreachable!("number expectation yields a number"),
                    Err(err) => return cannot_normalize(&err),
                };
                if let Some(min) = min {
                    if number < min.as_f64() {
                        return fail("range.min", format!("must be at least {min}"));
                    }
                }
                if let Some(max) = max {
                    if number > max.as_f64() {
                        return fail("range.max", format!("must be at most {max}"));
                    }
                }
                CheckResult::Pass
            }
            CompiledCheck::TemporalRange { min, max } => {
                let instant = match normalize::normalize_at(value, Expect::Instant, now) {
                    Ok(NormalizedValue::Instant { instant, .. }) => instant,
                    Ok(_) => unreachable!("instant expectation yields an instant"),
                    Err(err) => return cannot_normalize(&err),
                };
                if let Some(min) = min {
                    if instant < *min {
                        return fail(
                            "range.min",
                            format!("must not be before {}", min.to_rfc3339()),
                        );
                    }
                }
                if let Some(max) = max {
                    if instant > *max {
                        return fail(
                            "range.max",
                            format!("must not be after {}", max.to_rfc3339()),
                        );
                    }
                }
                CheckResult::Pass
            }
            CompiledCheck::TextRange { min, max } => {
                let Some(text) = value.as_str() else {
                    return type_mismatch(value, "string");
                };
                if let Some(min) = min {
                    if text < min.as_str() {
                        return fail("range.min", format!("must not sort before `{min}`"));
                    }
                }
                if let Some(max) = max {
                    if text > max.as_str() {
                        return fail("range.max", format!("must not sort after `{max}`"));
                    }
                }
                CheckResult::Pass
            }
            CompiledCheck::Pattern(regex) => {
                let Some(text) = value.as_str() else {
                    return type_mismatch(value, "string");
                };
                if regex.is_match(text) {
                    CheckResult::Pass
                } else {
                    fail("pattern", format!("must match pattern `{regex}`"))
                }
            }
            CompiledCheck::Length { min, max } => {
                let count = match value {
                    Value::String(s) => s.chars().count() as u64,
                    Value::List(items) => items.len() as u64,
                    Value::Map(entries) => entries.len() as u64,
                    other => return type_mismatch(other, "string, list, or map"),
                };
                if let Some(min) = min {
                    if count < *min {
                        return fail("length.min", format!("length must be at least {min}"));
                    }
                }
                if let Some(max) = max {
                    if count > *max {
                        return fail("length.max", format!("length must be at most {max}"));
                    }
                }
                CheckResult::Pass
            }
            CompiledCheck::InSet(allowed) => {
                if allowed.contains(value) {
                    CheckResult::Pass
                } else {
                    let listing = allowed
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(", ");
                    fail("in", format!("must be one of [{listing}]"))
                }
            }
            CompiledCheck::Predicate { name, func } => {
                if func(value) {
                    CheckResult::Pass
                } else {
                    fail("predicate", format!("predicate `{name}` not satisfied"))
                }
            }
        }
    }
}

fn fail(kind: &str, message: impl Into<String>) -> CheckResult {
    CheckResult::Fail {
        kind: kind.to_string(),
        message: message.into(),
    }
}

fn cannot_normalize(err: &crate::normalize::NormalizeError) -> CheckResult {
    CheckResult::CannotNormalize {
        kind: err.kind(),
        message: err.to_string(),
    }
}

fn type_mismatch(value: &Value, expected: &str) -> CheckResult {
    CheckResult::CannotNormalize {
        kind: "type",
        message: format!("cannot normalize {} value as {expected}", value.type_name()),
    }
}

fn compile_range(
    min: Option<&Value>,
    max: Option<&Value>,
) -> Result<CompiledCheck, ConstraintSetError> {
    // Bound agreement was enforced at definition time; the first present
    // bound picks the comparison domain.
    let witness = min.or(max).ok_or_else(|| ConstraintSetError {
        cause: "range constraint has no bounds".to_string(),
    })?;

    match witness {
        Value::Int(_) | Value::Float(_) => Ok(CompiledCheck::NumericRange {
            min: min.map(numeric_bound).transpose()?,
            max: max.map(numeric_bound).transpose()?,
        }),
        Value::Timestamp(_) => Ok(CompiledCheck::TemporalRange {
            min: min.map(instant_bound).transpose()?,
            max: max.map(instant_bound).transpose()?,
        }),
        Value::String(_) => Ok(CompiledCheck::TextRange {
            min: min.and_then(Value::as_str).map(str::to_string),
            max: max.and_then(Value::as_str).map(str::to_string),
        }),
        other => Err(ConstraintSetError {
            cause: format!("unsupported range bound type {}", other.type_name()),
        }),
    }
}

fn numeric_bound(bound: &Value) -> Result<NumericBound, ConstraintSetError> {
    match bound {
        Value::Int(i) => Ok(NumericBound::Int(*i)),
        Value::Float(f) => Ok(NumericBound::Float(*f)),
        other => Err(ConstraintSetError {
            cause: format!("expected numeric bound, got {}", other.type_name()),
        }),
    }
}

fn instant_bound(bound: &Value) -> Result<DateTime<Utc>, ConstraintSetError> {
    let millis = bound.as_timestamp().ok_or_else(|| ConstraintSetError {
        cause: format!("expected timestamp bound, got {}", bound.type_name()),
    })?;
    DateTime::from_timestamp_millis(millis).ok_or_else(|| ConstraintSetError {
        cause: format!("timestamp bound {millis} is out of range"),
    })
}
