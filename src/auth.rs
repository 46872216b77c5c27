//! Per-table, per-operation authorization guard.
//!
//! A capability-style predicate applied as a final gate before any read is
//! returned or any write is committed. The query planner already scopes every
//! fetch by owner, so in correct operation the guard is a no-op; it exists as
//! a second layer to catch a planner bug that forgets the owner filter.
//!
//! The rule registry is an explicit object constructed once at startup and
//! injected into call sites, never a package-level mutable global. That also
//! makes per-test rule overrides safe under parallel test execution.

use std::collections::HashMap;

use crate::models::OwnedDocument;
use crate::{Error, Result};

/// Operations a caller can perform against a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Read a document.
    Read,
    /// Insert a new document.
    Insert,
    /// Modify an existing document.
    Modify,
    /// Delete a document.
    Delete,
}

impl Operation {
    /// Returns all operations.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Read, Self::Insert, Self::Modify, Self::Delete]
    }

    /// Returns the operation as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Insert => "insert",
            Self::Modify => "modify",
            Self::Delete => "delete",
        }
    }
}

/// The authenticated caller's identity.
///
/// Supplied by the authentication layer (out of scope here) and trusted as
/// already-verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerContext {
    /// Opaque owner identifier.
    pub owner_id: String,
}

impl CallerContext {
    /// Creates a caller context from an owner identifier.
    #[must_use]
    pub fn new(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
        }
    }
}

/// The rule applied to one table+operation pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// Any caller may perform the operation (global/shared data).
    AllowAll,
    /// The document's owner must equal the caller's identity.
    OwnerOnly,
    /// No caller may perform the operation (lockdown, e.g. a read-only
    /// installation).
    DenyAll,
}

/// Result of a guard check, carrying the denial reason when refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessResult {
    /// Access granted.
    Granted,
    /// Access denied with reason.
    Denied(String),
}

impl AccessResult {
    /// Returns true if access was granted.
    #[must_use]
    pub const fn is_granted(&self) -> bool {
        matches!(self, Self::Granted)
    }
}

/// Registry of table → operation → rule.
///
/// Tables with no registered rules are treated as global/shared data and
/// default to allow (e.g. the tag vocabulary and ranking config). A registered
/// table with no rule for a specific operation also defaults to allow;
/// deny-by-default is a documented but unused alternative.
#[derive(Debug, Clone)]
pub struct AccessRules {
    tables: HashMap<&'static str, HashMap<Operation, Rule>>,
}

impl Default for AccessRules {
    fn default() -> Self {
        Self::new()
    }
}

impl AccessRules {
    /// Creates the canonical rule set: owner-identity checks on every
    /// operation of the owner-scoped tables.
    #[must_use]
    pub fn new() -> Self {
        let mut rules = Self::empty();
        for table in ["prompts", "user_prefs"] {
            for op in Operation::all() {
                rules.register(table, *op, Rule::OwnerOnly);
            }
        }
        rules
    }

    /// Creates an empty registry (everything default-allow). Useful in tests.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            tables: HashMap::new(),
        }
    }

    /// Registers a rule for a table+operation pair.
    pub fn register(&mut self, table: &'static str, operation: Operation, rule: Rule) {
        self.tables.entry(table).or_default().insert(operation, rule);
    }

    /// Checks an operation and returns a detailed result.
    #[must_use]
    pub fn check(
        &self,
        ctx: &CallerContext,
        table: &str,
        operation: Operation,
        document: &dyn OwnedDocument,
    ) -> AccessResult {
        let Some(rule) = self
            .tables
            .get(table)
            .and_then(|ops| ops.get(&operation))
        else {
            // Unregistered table or operation: global/shared data.
            return AccessResult::Granted;
        };

        match rule {
            Rule::AllowAll => AccessResult::Granted,
            Rule::DenyAll => AccessResult::Denied(format!(
                "{} on '{table}' is disabled by rule",
                operation.as_str()
            )),
            Rule::OwnerOnly => {
                if document.owner_id() == Some(ctx.owner_id.as_str()) {
                    AccessResult::Granted
                } else {
                    AccessResult::Denied(format!(
                        "caller '{}' does not own the document",
                        ctx.owner_id
                    ))
                }
            },
        }
    }

    /// Enforces an operation, raising a structured error on denial.
    ///
    /// The error carries table and operation for audit logging; denied data is
    /// never silently dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthorized`] when the rule refuses the caller.
    pub fn enforce(
        &self,
        ctx: &CallerContext,
        table: &str,
        operation: Operation,
        document: &dyn OwnedDocument,
    ) -> Result<()> {
        match self.check(ctx, table, operation, document) {
            AccessResult::Granted => Ok(()),
            AccessResult::Denied(reason) => {
                tracing::warn!(
                    table,
                    operation = operation.as_str(),
                    reason,
                    "authorization denied"
                );
                Err(Error::Unauthorized {
                    table: table.to_string(),
                    operation: operation.as_str().to_string(),
                })
            },
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use super::*;

    struct Doc(Option<&'static str>);

    impl OwnedDocument for Doc {
        fn owner_id(&self) -> Option<&str> {
            self.0
        }
    }

    #[test]
    fn test_owner_match_granted() {
        let rules = AccessRules::new();
        let ctx = CallerContext::new("user-1");
        for op in Operation::all() {
            let result = rules.check(&ctx, "prompts", *op, &Doc(Some("user-1")));
            assert!(result.is_granted(), "{op:?} should be granted");
        }
    }

    #[test]
    fn test_owner_mismatch_denied() {
        let rules = AccessRules::new();
        let ctx = CallerContext::new("user-1");
        let result = rules.check(&ctx, "prompts", Operation::Read, &Doc(Some("user-2")));
        assert!(!result.is_granted());
    }

    #[test]
    fn test_unregistered_table_default_allows() {
        let rules = AccessRules::new();
        let ctx = CallerContext::new("user-1");
        // Tags and ranking config are shared data with no registered predicate.
        let result = rules.check(&ctx, "tags", Operation::Delete, &Doc(Some("user-2")));
        assert!(result.is_granted());
    }

    #[test]
    fn test_registered_table_missing_operation_default_allows() {
        let mut rules = AccessRules::empty();
        rules.register("prompts", Operation::Delete, Rule::OwnerOnly);

        let ctx = CallerContext::new("user-1");
        // Only Delete is registered; Read falls through to allow.
        let read = rules.check(&ctx, "prompts", Operation::Read, &Doc(Some("user-2")));
        assert!(read.is_granted());
        let delete = rules.check(&ctx, "prompts", Operation::Delete, &Doc(Some("user-2")));
        assert!(!delete.is_granted());
    }

    #[test]
    fn test_enforce_carries_table_and_operation() {
        let rules = AccessRules::new();
        let ctx = CallerContext::new("user-1");
        let err = rules
            .enforce(&ctx, "prompts", Operation::Modify, &Doc(Some("user-2")))
            .unwrap_err();
        match err {
            crate::Error::Unauthorized { table, operation } => {
                assert_eq!(table, "prompts");
                assert_eq!(operation, "modify");
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_allow_all_rule() {
        let mut rules = AccessRules::empty();
        rules.register("prompts", Operation::Read, Rule::AllowAll);
        let ctx = CallerContext::new("user-1");
        let result = rules.check(&ctx, "prompts", Operation::Read, &Doc(Some("user-2")));
        assert!(result.is_granted());
    }

    #[test]
    fn test_deny_all_rule_refuses_owner_too() {
        let mut rules = AccessRules::new();
        rules.register("prompts", Operation::Insert, Rule::DenyAll);
        let ctx = CallerContext::new("user-1");
        // Even the document's owner is refused under a lockdown rule.
        let result = rules.check(&ctx, "prompts", Operation::Insert, &Doc(Some("user-1")));
        assert!(!result.is_granted());
        // Other operations keep their owner predicate.
        let read = rules.check(&ctx, "prompts", Operation::Read, &Doc(Some("user-1")));
        assert!(read.is_granted());
    }

    #[test]
    fn test_ownerless_document_denied_under_owner_rule() {
        let rules = AccessRules::new();
        let ctx = CallerContext::new("user-1");
        let result = rules.check(&ctx, "prompts", Operation::Read, &Doc(None));
        assert!(!result.is_granted());
    }
}
