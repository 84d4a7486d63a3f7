//! Coercion of raw input into canonical typed values.
//!
//! Two expectation families are supported: date/time strings resolved to a
//! canonical UTC instant with precision, and numeric input evaluated from
//! literals or arithmetic/statistical expressions. Both are pure transforms;
//! failures are typed and carry enough context to become violations.

pub(crate) mod date;
pub(crate) mod numeric;

use chrono::{DateTime, Utc};

use crate::value::Value;

pub use date::{DatePrecision, UnparseableDateError};
pub use numeric::NumericEvaluationError;

/// The canonical type a raw value should be coerced to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Expect {
    /// A finite `f64`, from a literal or an expression string.
    Number,
    /// A UTC instant, from a timestamp or a date/time string.
    Instant,
}

/// The result of a successful normalization.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum NormalizedValue {
    /// A finite number.
    Number(f64),
    /// An instant with the precision the source grammar carried.
    Instant {
        /// The resolved instant.
        instant: DateTime<Utc>,
        /// How much of the instant the input actually specified.
        precision: DatePrecision,
    },
}

/// Why a raw value could not be normalized.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum NormalizeError {
    /// No supported date grammar matched, or several disagreed.
    #[error(transparent)]
    Date(#[from] UnparseableDateError),

    /// The numeric expression failed to parse or evaluate.
    #[error(transparent)]
    Numeric(#[from] NumericEvaluationError),

    /// The raw value's type cannot be coerced to the expectation at all.
    #[error("cannot normalize {actual} value as {expected}")]
    TypeMismatch {
        /// Type name of the raw value.
        actual: &'static str,
        /// Human label for the expectation.
        expected: &'static str,
    },
}

impl NormalizeError {
    /// The violation kind this failure is reported under during validation.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            NormalizeError::Date(err) if err.ambiguous => "date.ambiguous",
            NormalizeError::Date(_) => "date.unparseable",
            NormalizeError::Numeric(NumericEvaluationError::DivisionByZero) => {
                "number.division_by_zero"
            }
            NormalizeError::Numeric(NumericEvaluationError::NonFinite { .. }) => {
                "number.non_finite"
            }
            NormalizeError::Numeric(_) => "number.invalid",
            NormalizeError::TypeMismatch { .. } => "type",
        }
    }
}

/// Normalize a raw value against an expectation, resolving relative date
/// phrases against the current time.
///
/// # Errors
///
/// Returns [`NormalizeError`] when the value's type cannot satisfy the
/// expectation or the textual input fails its grammar.
pub fn normalize(raw: &Value, expect: Expect) -> Result<NormalizedValue, NormalizeError> {
    normalize_at(raw, expect, Utc::now())
}

/// [`normalize`] with an explicit `now`, for deterministic resolution of
/// relative phrases.
///
/// # Errors
///
/// Same contract as [`normalize`].
pub fn normalize_at(
    raw: &Value,
    expect: Expect,
    now: DateTime<Utc>,
) -> Result<NormalizedValue, NormalizeError> {
    match expect {
        Expect::Number => match raw {
            Value::Int(_) | Value::Float(_) => {
                let number = raw.as_float().unwrap_or_default();
                if number.is_finite() {
                    Ok(NormalizedValue::Number(number))
                } else {
                    Err(NumericEvaluationError::NonFinite { value: number }.into())
                }
            }
            Value::String(expr) => Ok(NormalizedValue::Number(numeric::evaluate(expr)?)),
            other => Err(NormalizeError::TypeMismatch {
                actual: other.type_name(),
                expected: "number",
            }),
        },
        Expect::Instant => match raw {
            Value::Timestamp(millis) => Ok(NormalizedValue::Instant {
                instant: DateTime::from_timestamp_millis(*millis).ok_or_else(|| {
                    UnparseableDateError {
                        input: millis.to_string(),
                        ambiguous: false,
                    }
                })?,
                precision: DatePrecision::Millisecond,
            }),
            Value::String(text) => {
                let parsed = date::parse(text, now)?;
                Ok(NormalizedValue::Instant {
                    instant: parsed.instant,
                    precision: parsed.precision,
                })
            }
            other => Err(NormalizeError::TypeMismatch {
                actual: other.type_name(),
                expected: "date/time",
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn numbers_pass_through_and_strings_evaluate() {
        assert_eq!(
            normalize(&Value::Int(42), Expect::Number).expect("int must normalize"),
            NormalizedValue::Number(42.0)
        );
        assert_eq!(
            normalize(&Value::String("2 * (3 + 4)".to_string()), Expect::Number)
                .expect("expression must normalize"),
            NormalizedValue::Number(14.0)
        );
    }

    #[test]
    fn type_mismatches_are_reported_with_both_sides() {
        let err = normalize(&Value::Bool(true), Expect::Number).expect_err("bool is not numeric");
        assert_eq!(err.kind(), "type");
        assert_eq!(err.to_string(), "cannot normalize bool value as number");
    }

    #[test]
    fn non_finite_floats_are_rejected_up_front() {
        let err = normalize(&Value::Float(f64::INFINITY), Expect::Number)
            .expect_err("infinity is not a usable number");
        assert_eq!(err.kind(), "number.non_finite");
    }

    #[test]
    fn timestamps_normalize_as_instants() {
        let normalized = normalize(&Value::Timestamp(1_700_000_000_000), Expect::Instant)
            .expect("timestamp must normalize");
        let NormalizedValue::Instant { instant, precision } = normalized else {
            panic!("expected an instant");
        };
        assert_eq!(instant.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(precision, DatePrecision::Millisecond);
    }
}
