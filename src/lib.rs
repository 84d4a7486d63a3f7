//! Declarative constraint validation and coercion for in-memory value graphs.
//!
//! Callers describe validation rules as immutable [`ConstraintSet`]s of
//! path-addressed [`Constraint`]s. The engine compiles each distinct set once
//! into a reusable artifact, caches it for the lifetime of the [`Validator`],
//! and evaluates it against concrete [`Value`] graphs, collecting every
//! violation in one pass instead of failing fast.
//!
//! # Quick start
//!
//! For one-off validation, use the [`validate`] convenience function:
//!
//! ```rust
//! use graph_validate::{Constraint, ConstraintKind, ConstraintSet, Value, validate};
//!
//! let set = ConstraintSet::new([
//!     Constraint::new("age", ConstraintKind::Required)?,
//!     Constraint::new("age", ConstraintKind::range(Value::Int(0), Value::Int(120)))?,
//! ]);
//!
//! let graph = Value::from(serde_json::json!({ "age": 34 }));
//! let report = validate(&set, &graph)?;
//! assert!(report.is_valid());
//! # Ok::<(), graph_validate::Error>(())
//! ```
//!
//! For repeated validations, construct a [`Validator`] once to cache compiled
//! constraint sets across calls:
//!
//! ```rust,no_run
//! use graph_validate::Validator;
//! # fn example(set: &graph_validate::ConstraintSet, graph: &graph_validate::Value) {
//! let validator = Validator::new();
//! let report = validator.validate(set, graph).expect("constraint set should compile");
//! for violation in report.violations() {
//!     eprintln!("{violation}");
//! }
//! # }
//! ```
//!
//! # Error types
//!
//! | Type | When |
//! |------|------|
//! | [`InvalidConstraintError`] | Constraint parameters do not match the kind's contract |
//! | [`ConstraintSetError`] | A set conflicts with itself or cannot be compiled |
//! | [`NormalizeError`] | A raw value cannot be coerced to its expected type |
//!
//! The first two are programmer errors and surface immediately through
//! [`Error`]. Normalization failures encountered *during* validation are
//! data-quality problems: they are recorded as violations in the report so a
//! single bad field never aborts validation of the rest of the graph.
//! The [`normalize`] module also exposes them directly for callers that want
//! coercion without validation.

#![warn(missing_docs)]

mod config;
mod constraint;
mod error;
mod path;
mod report;
mod validator;
mod value;

pub mod normalize;

pub use config::{NowFn, PredicateFn, ValidationOption, ValidatorOption};
pub use constraint::{Constraint, ConstraintKind, ConstraintSet};
pub use error::{ConstraintSetError, Error, InvalidConstraintError};
pub use normalize::{NormalizeError, NumericEvaluationError, UnparseableDateError};
pub use path::{Path, Segment};
pub use report::{ValidationReport, Violation};
pub use validator::{Validator, validate};
pub use value::Value;
