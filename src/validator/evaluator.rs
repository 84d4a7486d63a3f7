use std::collections::HashSet;

use crate::config::ValidationConfig;
use crate::error::merge_violations;
use crate::path::Path;
use crate::report::Violation;
use crate::value::Value;

use super::checks::{CheckResult, CompiledCheck};

/// One constraint, compiled and ready to run against a graph.
pub(crate) struct ConstraintEval {
    pub path: Path,
    pub check: CompiledCheck,
    pub template: Option<String>,
}

/// A whole constraint set compiled into executable form. Immutable and
/// shareable; one instance serves every validation of the originating set.
pub(crate) struct SetEval {
    evals: Vec<ConstraintEval>,
}

impl std::fmt::Debug for SetEval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SetEval")
            .field("evals", &self.evals.len())
            .finish()
    }
}

impl SetEval {
    pub(crate) fn new(evals: Vec<ConstraintEval>) -> Self {
        Self { evals }
    }

    /// Evaluate the set against a graph, collecting violations in constraint
    /// declaration order.
    ///
    /// A failed `required` check, or a value that cannot be normalized,
    /// suppresses every later check on the same path so one root cause never
    /// fans out into a cascade of secondary violations.
    pub(crate) fn evaluate(&self, graph: &Value, cfg: &ValidationConfig) -> Vec<Violation> {
        let now = (cfg.now_fn)();
        let mut violations = Vec::new();
        let mut suppressed: HashSet<&Path> = HashSet::new();

        for eval in &self.evals {
            if suppressed.contains(&eval.path) {
                continue;
            }

            let value = if eval.path.is_root() {
                Some(graph)
            } else {
                graph.lookup(&eval.path)
            };

            let new = match eval.check.check(value, now) {
                CheckResult::Pass => Vec::new(),
                CheckResult::Fail { kind, message } => {
                    if eval.check.is_required() {
                        suppressed.insert(&eval.path);
                    }
                    vec![eval.violation(kind, value, message)]
                }
                CheckResult::CannotNormalize { kind, message } => {
                    suppressed.insert(&eval.path);
                    vec![eval.violation(kind, value, message)]
                }
            };

            if !merge_violations(&mut violations, new, cfg.fail_fast) {
                break;
            }
        }

        violations
    }
}

impl ConstraintEval {
    fn violation(
        &self,
        kind: impl Into<String>,
        value: Option<&Value>,
        default_message: String,
    ) -> Violation {
        let message = match &self.template {
            Some(template) => render_template(template, &self.path, value),
            None => default_message,
        };
        Violation::new(self.path.clone(), kind, value.cloned(), message)
    }
}

fn render_template(template: &str, path: &Path, value: Option<&Value>) -> String {
    let rendered_value = value.map_or_else(|| "null".to_string(), ToString::to_string);
    template
        .replace("{path}", &path.to_string())
        .replace("{value}", &rendered_value)
}
