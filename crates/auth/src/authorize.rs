//! Typed authorization rules and the policy engine that evaluates them.
//!
//! A [`Rule`] is a small expression tree over authorities and named resource
//! predicates. Predicates are registered by name on the [`PolicyEngine`]; the
//! engine ships with the direct and transitive permission predicates.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use quizgate_core::ResourceId;

use crate::{Authority, Mode, PermissionEvaluator, Principal};

/// Name of the built-in direct ACL predicate.
pub const HAS_PERMISSION: &str = "has_permission";

/// Name of the built-in parent-collection predicate.
pub const HAS_PERMISSION_THROUGH_PARENT: &str = "has_permission_through_parent";

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AuthzError {
    #[error("permission denied")]
    PermissionDenied,

    #[error("resource not found")]
    NotFound,
}

/// Named check on a single resource.
pub trait ResourcePredicate: Send + Sync {
    fn check(&self, evaluator: &PermissionEvaluator, principal: &Principal, resource: ResourceId, mode: Mode) -> bool;
}

impl<F> ResourcePredicate for F
where
    F: Fn(&PermissionEvaluator, &Principal, ResourceId, Mode) -> bool + Send + Sync,
{
    fn check(&self, evaluator: &PermissionEvaluator, principal: &Principal, resource: ResourceId, mode: Mode) -> bool {
        self(evaluator, principal, resource, mode)
    }
}

/// Authorization expression.
///
/// `All(vec![])` is true and `Any(vec![])` is false.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum Rule {
    Authority { name: Authority },
    Check { predicate: Cow<'static, str>, mode: Mode },
    All { rules: Vec<Rule> },
    Any { rules: Vec<Rule> },
}

impl Rule {
    pub fn authority(name: Authority) -> Self {
        Rule::Authority { name }
    }

    pub fn check(predicate: impl Into<Cow<'static, str>>, mode: Mode) -> Self {
        Rule::Check {
            predicate: predicate.into(),
            mode,
        }
    }

    pub fn all(rules: impl IntoIterator<Item = Rule>) -> Self {
        Rule::All {
            rules: rules.into_iter().collect(),
        }
    }

    pub fn any(rules: impl IntoIterator<Item = Rule>) -> Self {
        Rule::Any {
            rules: rules.into_iter().collect(),
        }
    }

    /// Standard resource rule: admin, or a user holding `mode` directly or
    /// through a parent collection.
    pub fn resource_access(mode: Mode) -> Self {
        Rule::any([
            Rule::authority(Authority::ADMIN),
            Rule::all([Rule::authority(Authority::USER), Rule::check(HAS_PERMISSION, mode)]),
            Rule::all([
                Rule::authority(Authority::USER),
                Rule::check(HAS_PERMISSION_THROUGH_PARENT, mode),
            ]),
        ])
    }
}

/// One evaluated leaf, for audit output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeafOutcome {
    pub leaf: String,
    pub result: bool,
}

/// Outcome of a rule evaluation with the leaves that were actually visited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorizationExplanation {
    pub resource: ResourceId,
    pub granted: bool,
    pub found: bool,
    pub visited: Vec<LeafOutcome>,
}

/// Registry of named predicates plus the evaluator they run against.
#[derive(Clone)]
pub struct PolicyEngine {
    evaluator: PermissionEvaluator,
    predicates: HashMap<String, Arc<dyn ResourcePredicate>>,
}

impl PolicyEngine {
    pub fn new(evaluator: PermissionEvaluator) -> Self {
        let mut engine = Self {
            evaluator,
            predicates: HashMap::new(),
        };
        engine.register(HAS_PERMISSION, |ev: &PermissionEvaluator, p: &Principal, r: ResourceId, m: Mode| {
            ev.has_direct_permission(p, r, m)
        });
        engine.register(
            HAS_PERMISSION_THROUGH_PARENT,
            |ev: &PermissionEvaluator, p: &Principal, r: ResourceId, m: Mode| ev.has_transitive_permission(p, r, m),
        );
        engine
    }

    pub fn evaluator(&self) -> &PermissionEvaluator {
        &self.evaluator
    }

    /// Register (or replace) a predicate under `name`.
    pub fn register(&mut self, name: impl Into<String>, predicate: impl ResourcePredicate + 'static) {
        self.predicates.insert(name.into(), Arc::new(predicate));
    }

    pub fn evaluate(&self, rule: &Rule, principal: &Principal, resource: ResourceId) -> bool {
        self.eval(rule, principal, resource, &mut None)
    }

    /// Evaluate `rule`, distinguishing a missing resource from a denial.
    pub fn authorize(&self, rule: &Rule, principal: &Principal, resource: ResourceId) -> Result<(), AuthzError> {
        if !self.evaluator.resource_exists(resource) {
            return Err(AuthzError::NotFound);
        }
        if self.evaluate(rule, principal, resource) {
            Ok(())
        } else {
            tracing::debug!(
                account_id = %principal.account_id,
                resource = %resource,
                "authorization denied"
            );
            Err(AuthzError::PermissionDenied)
        }
    }

    pub fn explain(&self, rule: &Rule, principal: &Principal, resource: ResourceId) -> AuthorizationExplanation {
        let found = self.evaluator.resource_exists(resource);
        let mut visited = Some(Vec::new());
        let granted = found && self.eval(rule, principal, resource, &mut visited);
        AuthorizationExplanation {
            resource,
            granted,
            found,
            visited: visited.unwrap_or_default(),
        }
    }

    fn eval(
        &self,
        rule: &Rule,
        principal: &Principal,
        resource: ResourceId,
        trace: &mut Option<Vec<LeafOutcome>>,
    ) -> bool {
        match rule {
            Rule::Authority { name } => {
                let held = principal.has_authority(name.as_str());
                record(trace, || format!("authority {name}"), held);
                held
            }
            Rule::Check { predicate, mode } => {
                let result = match self.predicates.get(predicate.as_ref()) {
                    Some(p) => p.check(&self.evaluator, principal, resource, *mode),
                    None => {
                        tracing::warn!(predicate = %predicate, "unknown authorization predicate");
                        false
                    }
                };
                record(trace, || format!("{predicate}({mode})"), result);
                result
            }
            Rule::All { rules } => rules.iter().all(|r| self.eval(r, principal, resource, trace)),
            Rule::Any { rules } => rules.iter().any(|r| self.eval(r, principal, resource, trace)),
        }
    }
}

impl core::fmt::Debug for PolicyEngine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut names: Vec<&str> = self.predicates.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("PolicyEngine").field("predicates", &names).finish()
    }
}

fn record(trace: &mut Option<Vec<LeafOutcome>>, leaf: impl FnOnce() -> String, result: bool) {
    if let Some(out) = trace {
        out.push(LeafOutcome { leaf: leaf(), result });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::tests::{FixedAcl, user};
    use quizgate_core::AccountId;

    fn engine(acl: FixedAcl) -> PolicyEngine {
        PolicyEngine::new(PermissionEvaluator::new(Arc::new(acl)))
    }

    #[test]
    fn user_with_course_read_can_read_quiz() {
        let p = user();
        let (course, quiz) = (ResourceId::new(), ResourceId::new());
        let engine = engine(
            FixedAcl::default()
                .resource(course, &[])
                .resource(quiz, &[course])
                .grant(p.account_id, course, &[Mode::Read]),
        );

        assert_eq!(engine.authorize(&Rule::resource_access(Mode::Read), &p, quiz), Ok(()));
        assert_eq!(
            engine.authorize(&Rule::resource_access(Mode::Write), &p, quiz),
            Err(AuthzError::PermissionDenied)
        );
    }

    #[test]
    fn admin_passes_without_acl_entries() {
        let admin = Principal::new(AccountId::new(), "root", vec![Authority::ADMIN]);
        let quiz = ResourceId::new();
        let engine = engine(FixedAcl::default().resource(quiz, &[]));

        assert!(engine.authorize(&Rule::resource_access(Mode::Administration), &admin, quiz).is_ok());
    }

    #[test]
    fn acl_entry_without_user_role_is_denied() {
        let p = Principal::new(AccountId::new(), "ghost", vec![]);
        let quiz = ResourceId::new();
        let engine = engine(FixedAcl::default().resource(quiz, &[]).grant(p.account_id, quiz, &[Mode::Read]));

        assert_eq!(
            engine.authorize(&Rule::resource_access(Mode::Read), &p, quiz),
            Err(AuthzError::PermissionDenied)
        );
    }

    #[test]
    fn missing_resource_is_not_found_not_denied() {
        let engine = engine(FixedAcl::default());

        assert_eq!(
            engine.authorize(&Rule::resource_access(Mode::Read), &user(), ResourceId::new()),
            Err(AuthzError::NotFound)
        );
    }

    #[test]
    fn unknown_predicate_fails_closed() {
        let quiz = ResourceId::new();
        let engine = engine(FixedAcl::default().resource(quiz, &[]));

        assert!(!engine.evaluate(&Rule::check("no_such_predicate", Mode::Read), &user(), quiz));
    }

    #[test]
    fn empty_combinators() {
        let quiz = ResourceId::new();
        let engine = engine(FixedAcl::default().resource(quiz, &[]));

        assert!(engine.evaluate(&Rule::all([]), &user(), quiz));
        assert!(!engine.evaluate(&Rule::any([]), &user(), quiz));
    }

    #[test]
    fn custom_predicates_can_be_registered() {
        let quiz = ResourceId::new();
        let mut engine = engine(FixedAcl::default().resource(quiz, &[]));
        engine.register("always", |_: &PermissionEvaluator, _: &Principal, _: ResourceId, _: Mode| true);

        assert!(engine.evaluate(&Rule::check("always", Mode::Share), &user(), quiz));
    }

    #[test]
    fn explanation_lists_visited_leaves() {
        let p = user();
        let quiz = ResourceId::new();
        let engine = engine(FixedAcl::default().resource(quiz, &[]).grant(p.account_id, quiz, &[Mode::Read]));

        let explained = engine.explain(&Rule::resource_access(Mode::Read), &p, quiz);
        assert!(explained.granted);
        assert!(explained.found);
        assert_eq!(
            explained.visited,
            vec![
                LeafOutcome { leaf: "authority ROLE_ADMIN".into(), result: false },
                LeafOutcome { leaf: "authority ROLE_USER".into(), result: true },
                LeafOutcome { leaf: "has_permission(read)".into(), result: true },
            ]
        );
    }
}
