use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use crate::config::{ValidationConfig, ValidationOption, ValidatorOption, default_now_fn};
use crate::constraint::ConstraintSet;
use crate::error::Error;
use crate::report::ValidationReport;
use crate::value::Value;

mod builder;
mod checks;
mod evaluator;

use builder::Builder;

/// Thread-safe validator for value graphs.
///
/// Validates graphs against declarative [`ConstraintSet`]s. Each distinct set
/// is compiled lazily on first use and cached by structural identity, so
/// repeated validation of equal sets pays the compilation cost once.
pub struct Validator {
    builder: Builder,
    config: ValidationConfig,
}

impl Validator {
    /// Create a new `Validator` with default options.
    #[must_use]
    pub fn new() -> Self {
        Self {
            builder: Builder::new(),
            config: ValidationConfig::default(),
        }
    }

    /// Create a new `Validator` with the given options.
    #[must_use]
    pub fn with_options(options: &[ValidatorOption]) -> Self {
        let mut fail_fast = false;
        let mut now_fn = default_now_fn();
        let mut predicates = HashMap::new();

        for opt in options {
            match opt {
                ValidatorOption::FailFast => fail_fast = true,
                ValidatorOption::NowFn(f) => now_fn = Arc::clone(f),
                ValidatorOption::Predicate(name, func) => {
                    predicates.insert(name.clone(), Arc::clone(func));
                }
            }
        }

        Self {
            builder: Builder::with_predicates(predicates),
            config: ValidationConfig { fail_fast, now_fn },
        }
    }

    /// Validate a value graph against a constraint set.
    ///
    /// The report carries every violation found; a report with none is valid.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] only when the set itself is defective: it
    /// conflicts with itself, names an unregistered predicate, or falls
    /// outside its declared shape. Data-quality problems in the graph are
    /// reported as violations, never as errors.
    pub fn validate(&self, set: &ConstraintSet, graph: &Value) -> Result<ValidationReport, Error> {
        self.validate_with(set, graph, &[])
    }

    /// Validate with per-call validation options.
    ///
    /// # Errors
    ///
    /// Same contract as [`Validator::validate`].
    pub fn validate_with(
        &self,
        set: &ConstraintSet,
        graph: &Value,
        options: &[ValidationOption],
    ) -> Result<ValidationReport, Error> {
        let eval = self.builder.load_or_build(set)?;
        let cfg = effective_config(&self.config, options);
        Ok(ValidationReport::from_violations(eval.evaluate(graph, &cfg)))
    }
}

fn effective_config(base: &ValidationConfig, options: &[ValidationOption]) -> ValidationConfig {
    let mut cfg = ValidationConfig {
        fail_fast: base.fail_fast,
        now_fn: Arc::clone(&base.now_fn),
    };

    for option in options {
        match option {
            ValidationOption::FailFast => cfg.fail_fast = true,
            ValidationOption::NowFn(now_fn) => cfg.now_fn = Arc::clone(now_fn),
        }
    }

    cfg
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL_VALIDATOR: LazyLock<Validator> = LazyLock::new(Validator::new);

/// Validate a value graph using a global `Validator` instance.
///
/// This is a convenience function that uses a shared, lazily-initialized
/// validator. Its compiled-set cache lives for the process lifetime; for
/// short-lived or predicate-bearing workloads, construct a [`Validator`].
///
/// # Errors
///
/// Same contract as [`Validator::validate`].
pub fn validate(set: &ConstraintSet, graph: &Value) -> Result<ValidationReport, Error> {
    GLOBAL_VALIDATOR.validate(set, graph)
}

#[cfg(test)]
mod tests {
    use std::thread;

    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::config::PredicateFn;
    use crate::constraint::{Constraint, ConstraintKind};
    use crate::report::Violation;

    fn constraint(path: &str, kind: ConstraintKind) -> Constraint {
        Constraint::new(path, kind).expect("constraint must define")
    }

    fn graph(json: serde_json::Value) -> Value {
        Value::from(json)
    }

    fn person_set() -> ConstraintSet {
        ConstraintSet::new([
            constraint("age", ConstraintKind::Required),
            constraint("age", ConstraintKind::range(Value::Int(0), Value::Int(120))),
            constraint("name", ConstraintKind::length(1, 64)),
        ])
    }

    fn kinds(report: &ValidationReport) -> Vec<&str> {
        report.violations().iter().map(Violation::kind).collect()
    }

    #[test]
    fn valid_graph_produces_empty_report() {
        let report = validate(&person_set(), &graph(serde_json::json!({ "age": 34 })))
            .expect("set must compile");
        assert!(report.is_valid());
        assert!(report.violations().is_empty());
    }

    #[test]
    fn validation_is_deterministic_and_idempotent() {
        let validator = Validator::new();
        let set = person_set();
        let bad = graph(serde_json::json!({ "age": 130, "name": "" }));

        let first = validator.validate(&set, &bad).expect("set must compile");
        let second = validator.validate(&set, &bad).expect("set must compile");

        assert_eq!(first, second);
        assert_eq!(kinds(&first), vec!["range.max", "length.min"]);
    }

    #[test]
    fn equal_sets_compile_once_across_threads() {
        const THREADS: usize = 8;

        let validator = Arc::new(Validator::new());
        let good = Arc::new(graph(serde_json::json!({ "age": 34 })));
        // Release all threads into first use at once so the compile race is
        // actually exercised, then count the compilations that happened.
        let barrier = Arc::new(std::sync::Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let validator = Arc::clone(&validator);
                let good = Arc::clone(&good);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    let report = validator
                        .validate(&person_set(), &good)
                        .expect("set must compile");
                    assert!(report.is_valid());
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("thread must not panic");
        }

        assert_eq!(validator.builder.cache_len(), 1);
        assert_eq!(validator.builder.compile_count(), 1);
    }

    #[test]
    fn required_failure_suppresses_dependent_checks() {
        let report = validate(&person_set(), &graph(serde_json::json!({})))
            .expect("set must compile");

        assert_eq!(kinds(&report), vec!["required"]);
        assert_eq!(report.violations()[0].path().to_string(), "age");
    }

    #[test]
    fn null_counts_as_missing_for_required() {
        let report = validate(&person_set(), &graph(serde_json::json!({ "age": null })))
            .expect("set must compile");
        assert_eq!(kinds(&report), vec!["required"]);
    }

    #[test]
    fn normalization_failure_suppresses_later_checks_on_the_path() {
        let set = ConstraintSet::new([
            constraint("score", ConstraintKind::range(Value::Int(0), Value::Int(100))),
            constraint(
                "score",
                ConstraintKind::in_set([Value::Int(0), Value::Int(50), Value::Int(100)]),
            ),
        ]);
        let report = validate(&set, &graph(serde_json::json!({ "score": "1/0" })))
            .expect("set must compile");

        assert_eq!(kinds(&report), vec!["number.division_by_zero"]);
    }

    #[test]
    fn numeric_expressions_evaluate_before_comparison() {
        let set = ConstraintSet::new([constraint(
            "score",
            ConstraintKind::range(Value::Int(0), Value::Int(100)),
        )]);

        let mean = graph(serde_json::json!({ "score": "mean(85, 92, 78)" }));
        assert!(validate(&set, &mean).expect("set must compile").is_valid());

        let sum = graph(serde_json::json!({ "score": "sum(60, 70)" }));
        assert_eq!(
            kinds(&validate(&set, &sum).expect("set must compile")),
            vec!["range.max"]
        );
    }

    #[test]
    fn impossible_dates_fail_instead_of_clamping() {
        let set = ConstraintSet::new([constraint(
            "birth",
            ConstraintKind::min(Value::Timestamp(0)),
        )]);
        let report = validate(&set, &graph(serde_json::json!({ "birth": "2024-02-30" })))
            .expect("set must compile");

        assert_eq!(kinds(&report), vec!["date.unparseable"]);
    }

    #[test]
    fn ambiguous_dates_are_their_own_violation_kind() {
        let set = ConstraintSet::new([constraint(
            "birth",
            ConstraintKind::min(Value::Timestamp(0)),
        )]);
        let report = validate(&set, &graph(serde_json::json!({ "birth": "03/04/2024" })))
            .expect("set must compile");

        assert_eq!(kinds(&report), vec!["date.ambiguous"]);
    }

    #[test]
    fn relative_dates_resolve_against_the_configured_clock() {
        let fixed_now = Utc.with_ymd_and_hms(2024, 5, 15, 10, 30, 0).unwrap();
        let cutoff = Utc.with_ymd_and_hms(2024, 5, 15, 0, 0, 0).unwrap();
        let set = ConstraintSet::new([constraint(
            "seen",
            ConstraintKind::max(Value::Timestamp(cutoff.timestamp_millis())),
        )]);
        let validator = Validator::with_options(&[ValidatorOption::NowFn(Arc::new(move || {
            fixed_now
        }))]);

        let yesterday = graph(serde_json::json!({ "seen": "yesterday" }));
        assert!(
            validator
                .validate(&set, &yesterday)
                .expect("set must compile")
                .is_valid()
        );

        let now = graph(serde_json::json!({ "seen": "now" }));
        assert_eq!(
            kinds(&validator.validate(&set, &now).expect("set must compile")),
            vec!["range.max"]
        );
    }

    #[test]
    fn violations_follow_constraint_declaration_order() {
        let set = ConstraintSet::new([
            constraint("c", ConstraintKind::Required),
            constraint("a", ConstraintKind::Required),
            constraint("b", ConstraintKind::Required),
        ]);
        let report = validate(&set, &graph(serde_json::json!({})))
            .expect("set must compile");

        let paths: Vec<String> = report
            .violations()
            .iter()
            .map(|v| v.path().to_string())
            .collect();
        assert_eq!(paths, vec!["c", "a", "b"]);
    }

    #[test]
    fn fail_fast_stops_after_the_first_violation() {
        let set = ConstraintSet::new([
            constraint("a", ConstraintKind::Required),
            constraint("b", ConstraintKind::Required),
        ]);
        let validator = Validator::new();

        let full = validator
            .validate(&set, &graph(serde_json::json!({})))
            .expect("set must compile");
        assert_eq!(full.violations().len(), 2);

        let fast = validator
            .validate_with(
                &set,
                &graph(serde_json::json!({})),
                &[ValidationOption::FailFast],
            )
            .expect("set must compile");
        assert_eq!(fast.violations().len(), 1);
    }

    #[test]
    fn nested_paths_and_indexes_resolve_into_the_graph() {
        let set = ConstraintSet::new([
            constraint("user.email", ConstraintKind::pattern("@")),
            constraint("user.tags[0]", ConstraintKind::in_set([Value::from("admin")])),
        ]);
        let good = graph(serde_json::json!({
            "user": { "email": "a@b.example", "tags": ["admin"] }
        }));
        assert!(validate(&set, &good).expect("set must compile").is_valid());

        let bad = graph(serde_json::json!({
            "user": { "email": "nope", "tags": ["guest"] }
        }));
        assert_eq!(
            kinds(&validate(&set, &bad).expect("set must compile")),
            vec!["pattern", "in"]
        );
    }

    #[test]
    fn absent_rejects_present_values_only() {
        let set = ConstraintSet::new([constraint("legacy_id", ConstraintKind::Absent)]);

        assert!(
            validate(&set, &graph(serde_json::json!({})))
                .expect("set must compile")
                .is_valid()
        );
        assert!(
            validate(&set, &graph(serde_json::json!({ "legacy_id": null })))
                .expect("set must compile")
                .is_valid()
        );
        assert_eq!(
            kinds(
                &validate(&set, &graph(serde_json::json!({ "legacy_id": 7 })))
                    .expect("set must compile")
            ),
            vec!["absent"]
        );
    }

    #[test]
    fn custom_predicates_run_by_registered_name() {
        let even: PredicateFn = Arc::new(|value| value.as_int().is_some_and(|i| i % 2 == 0));
        let validator = Validator::with_options(&[ValidatorOption::Predicate(
            "even".to_string(),
            even,
        )]);
        let set = ConstraintSet::new([constraint("count", ConstraintKind::predicate("even"))]);

        assert!(
            validator
                .validate(&set, &graph(serde_json::json!({ "count": 4 })))
                .expect("set must compile")
                .is_valid()
        );
        assert_eq!(
            kinds(
                &validator
                    .validate(&set, &graph(serde_json::json!({ "count": 3 })))
                    .expect("set must compile")
            ),
            vec!["predicate"]
        );
    }

    #[test]
    fn unregistered_predicate_is_a_set_error() {
        let set = ConstraintSet::new([constraint("count", ConstraintKind::predicate("even"))]);
        let err = Validator::new()
            .validate(&set, &graph(serde_json::json!({ "count": 4 })))
            .expect_err("unknown predicate must not compile");

        assert!(matches!(err, Error::ConstraintSet(_)));
        assert!(err.to_string().contains("unknown predicate `even`"));
    }

    #[test]
    fn message_templates_expand_path_and_value() {
        let set = ConstraintSet::new([Constraint::new(
            "age",
            ConstraintKind::max(Value::Int(120)),
        )
        .expect("constraint must define")
        .with_message("{path} must be a plausible age, got {value}")]);

        let report = validate(&set, &graph(serde_json::json!({ "age": 130 })))
            .expect("set must compile");
        assert_eq!(
            report.violations()[0].message(),
            "age must be a plausible age, got 130"
        );
        assert_eq!(report.violations()[0].actual(), Some(&Value::Int(130)));
    }

    #[test]
    fn per_call_options_do_not_mutate_the_validator() {
        let base = ValidationConfig::default();
        let fixed = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let options = vec![
            ValidationOption::FailFast,
            ValidationOption::NowFn(Arc::new(move || fixed)),
        ];

        let effective = effective_config(&base, &options);
        assert!(effective.fail_fast);
        assert_eq!((effective.now_fn)(), fixed);

        assert!(!base.fail_fast);
    }
}
