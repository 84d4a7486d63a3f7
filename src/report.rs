use std::fmt;

use serde::Serialize;

use crate::path::Path;
use crate::value::Value;

/// A single instance where a constraint was not met.
///
/// Produced only by the validation executor; immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[non_exhaustive]
pub struct Violation {
    path: Path,
    kind: String,
    #[serde(skip)]
    actual: Option<Value>,
    message: String,
}

impl Violation {
    pub(crate) fn new(
        path: Path,
        kind: impl Into<String>,
        actual: Option<Value>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            path,
            kind: kind.into(),
            actual,
            message: message.into(),
        }
    }

    /// The path where this violation occurred.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The machine-readable identifier of the violated rule,
    /// e.g. `required`, `range.max`, `date.unparseable`.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The value that failed validation, when one was present at the path.
    #[must_use]
    pub fn actual(&self) -> Option<&Value> {
        self.actual.as_ref()
    }

    /// The human-readable violation message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.path.is_root() {
            write!(f, "{}: ", self.path)?;
        }
        if self.message.is_empty() {
            write!(f, "[{}]", self.kind)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

/// The aggregate, immutable result of one validation run.
///
/// A plain value type: two reports with equal violation sequences are equal,
/// and `is_valid` is derived, never stored. Violations appear in the
/// declaration order of the originating constraint set.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValidationReport {
    violations: Vec<Violation>,
}

impl ValidationReport {
    pub(crate) fn from_violations(violations: Vec<Violation>) -> Self {
        Self { violations }
    }

    /// True iff no violations were recorded.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    /// The recorded violations, in constraint declaration order.
    #[must_use]
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }
}

impl Serialize for ValidationReport {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut out = serializer.serialize_struct("ValidationReport", 2)?;
        out.serialize_field("is_valid", &self.is_valid())?;
        out.serialize_field("violations", &self.violations)?;
        out.end()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.violations.len() {
            0 => write!(f, "valid"),
            1 => write!(f, "validation error: {}", self.violations[0]),
            _ => {
                write!(f, "validation errors:")?;
                for violation in &self.violations {
                    write!(f, "\n - {violation}")?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn violation(path: &str, kind: &str, message: &str) -> Violation {
        Violation::new(path.parse().expect("path must parse"), kind, None, message)
    }

    #[test]
    fn display_prefers_message_then_kind() {
        let with_message = violation("user.age", "range.max", "must be at most 120");
        assert_eq!(with_message.to_string(), "user.age: must be at most 120");

        let kind_only = violation("user.age", "required", "");
        assert_eq!(kind_only.to_string(), "user.age: [required]");
    }

    #[test]
    fn report_display_matches_single_and_multiple_formats() {
        let empty = ValidationReport::default();
        assert!(empty.is_valid());
        assert_eq!(empty.to_string(), "valid");

        let single = ValidationReport::from_violations(vec![violation("a", "required", "missing")]);
        assert_eq!(single.to_string(), "validation error: a: missing");

        let multiple = ValidationReport::from_violations(vec![
            violation("a", "required", "missing"),
            violation("b.c", "pattern", ""),
        ]);
        assert_eq!(
            multiple.to_string(),
            "validation errors:\n - a: missing\n - b.c: [pattern]"
        );
    }

    #[test]
    fn report_serializes_validity_and_plain_violation_data() {
        let report = ValidationReport::from_violations(vec![Violation::new(
            "user.age".parse().expect("path must parse"),
            "range.max",
            Some(Value::Int(130)),
            "must be at most 120".to_string(),
        )]);

        let json = serde_json::to_value(&report).expect("report must serialize");
        assert_eq!(
            json,
            serde_json::json!({
                "is_valid": false,
                "violations": [{
                    "path": "user.age",
                    "kind": "range.max",
                    "message": "must be at most 120",
                }],
            })
        );
    }
}
