//! Access policy: a static list of allow rules and the evaluator over it

use crate::auth::caller::RoleSet;
use crate::auth::permissions::{AccessRule, Action, Permissions};
use crate::resources::{ResourceError, ResourcePath, ResourcePattern};
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// The evaluator itself failed. Never to be read as allow or deny.
#[derive(Debug, Clone, Error)]
pub enum EvaluationError {
    #[error("rule lookup failed: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("failed to read policy file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse policy file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid resource pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        source: ResourceError,
    },

    #[error("policy entry has no roles")]
    NoRoles,
}

/// Decides whether a role set may perform an action on a resource
pub trait AccessEvaluator: Send + Sync {
    fn is_allowed(
        &self,
        roles: &RoleSet,
        resource: &ResourcePath,
        action: Action,
    ) -> Result<bool, EvaluationError>;
}

/// One entry of a policy file, shaped like `acl.allow` input:
///
/// ```json
/// { "roles": ["user"], "allows": [{ "resources": "/api/chats", "permissions": ["get", "post"] }] }
/// ```
#[derive(Debug, Deserialize)]
struct PolicyEntry {
    roles: Vec<String>,
    allows: Vec<AllowEntry>,
}

#[derive(Debug, Deserialize)]
struct AllowEntry {
    resources: OneOrMany,
    permissions: Permissions,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(v) => v,
        }
    }
}

/// A fixed set of allow rules, built once at startup
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    rules: Vec<AccessRule>,
}

impl AccessPolicy {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn from_rules(rules: impl IntoIterator<Item = AccessRule>) -> Self {
        let mut policy = Self::new();
        for rule in rules {
            policy.add(rule);
        }
        policy
    }

    /// The built-in policy for the chat resources
    pub fn chats() -> Self {
        let collection = chat_pattern("/api/chats");
        let item = chat_pattern("/api/chats/:chatId");

        Self::from_rules([
            AccessRule::new(["admin"], collection.clone(), Permissions::All),
            AccessRule::new(["admin"], item.clone(), Permissions::All),
            AccessRule::new(
                ["user"],
                collection.clone(),
                Permissions::only([Action::Get, Action::Post]),
            ),
            AccessRule::new(["user"], item.clone(), Permissions::only([Action::Get])),
            AccessRule::new(["guest"], collection, Permissions::only([Action::Get])),
            AccessRule::new(["guest"], item, Permissions::only([Action::Get])),
        ])
    }

    /// Parse a JSON policy document
    pub fn from_json(json: &str) -> Result<Self, PolicyError> {
        let entries: Vec<PolicyEntry> = serde_json::from_str(json)?;
        let mut policy = Self::new();

        for entry in entries {
            if entry.roles.is_empty() {
                return Err(PolicyError::NoRoles);
            }
            for allow in entry.allows {
                for resource in allow.resources.into_vec() {
                    let pattern = ResourcePattern::parse(&resource).map_err(|source| {
                        PolicyError::InvalidPattern {
                            pattern: resource.clone(),
                            source,
                        }
                    })?;
                    policy.add(AccessRule::new(
                        entry.roles.iter().cloned(),
                        pattern,
                        allow.permissions.clone(),
                    ));
                }
            }
        }

        Ok(policy)
    }

    /// Load a JSON policy file
    pub fn load(path: &Path) -> Result<Self, PolicyError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Add a rule to the policy
    pub fn add(&mut self, rule: AccessRule) {
        // Avoid duplicates
        if !self.rules.iter().any(|r| r == &rule) {
            self.rules.push(rule);
        }
    }

    /// Check if any role is allowed the action on the resource by any rule
    pub fn check(&self, roles: &RoleSet, resource: &ResourcePath, action: Action) -> bool {
        self.rules
            .iter()
            .any(|rule| rule.allows_any(roles, resource, action))
    }

    pub fn rules(&self) -> &[AccessRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl AccessEvaluator for AccessPolicy {
    fn is_allowed(
        &self,
        roles: &RoleSet,
        resource: &ResourcePath,
        action: Action,
    ) -> Result<bool, EvaluationError> {
        Ok(self.check(roles, resource, action))
    }
}

fn chat_pattern(s: &str) -> ResourcePattern {
    match ResourcePattern::parse(s) {
        Ok(pattern) => pattern,
        Err(e) => unreachable!("built-in pattern {} is invalid: {}", s, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> ResourcePath {
        ResourcePath::parse(s).unwrap()
    }

    #[test]
    fn test_guest_cannot_post() {
        let policy = AccessPolicy::chats();
        assert!(!policy.check(&RoleSet::guest(), &path("/api/chats"), Action::Post));
        assert!(policy.check(&RoleSet::guest(), &path("/api/chats"), Action::Get));
    }

    #[test]
    fn test_user_can_post() {
        let policy = AccessPolicy::chats();
        let user = RoleSet::new(["user"]);
        assert!(policy.check(&user, &path("/api/chats"), Action::Post));
        assert!(policy.check(&user, &path("/api/chats/abc"), Action::Get));
        assert!(!policy.check(&user, &path("/api/chats/abc"), Action::Delete));
    }

    #[test]
    fn test_admin_wildcard() {
        let policy = AccessPolicy::chats();
        let admin = RoleSet::new(["admin"]);
        for action in Action::ALL {
            assert!(policy.check(&admin, &path("/api/chats"), action));
            assert!(policy.check(&admin, &path("/api/chats/abc"), action));
        }
    }

    #[test]
    fn test_any_role_suffices() {
        let policy = AccessPolicy::chats();
        let roles = RoleSet::new(["guest", "user"]);
        assert!(policy.check(&roles, &path("/api/chats"), Action::Post));
    }

    #[test]
    fn test_unknown_role_and_resource_denied() {
        let policy = AccessPolicy::chats();
        assert!(!policy.check(&RoleSet::new(["auditor"]), &path("/api/chats"), Action::Get));
        assert!(!policy.check(&RoleSet::new(["admin"]), &path("/api/users"), Action::Get));
        assert!(!policy.check(&RoleSet::default(), &path("/api/chats"), Action::Get));
    }

    #[test]
    fn test_evaluator_result_is_authoritative() {
        let policy = AccessPolicy::chats();
        let denied = policy
            .is_allowed(&RoleSet::guest(), &path("/api/chats"), Action::Post)
            .unwrap();
        assert!(!denied);
    }

    #[test]
    fn test_from_json() {
        let json = r#"[
            { "roles": ["admin"], "allows": [{ "resources": ["/api/chats", "/api/chats/:chatId"], "permissions": "*" }] },
            { "roles": ["guest"], "allows": [{ "resources": "/api/chats", "permissions": ["get"] }] }
        ]"#;

        let policy = AccessPolicy::from_json(json).unwrap();
        assert_eq!(policy.rules().len(), 3);
        assert!(policy.check(&RoleSet::new(["admin"]), &path("/api/chats/x"), Action::Delete));
        assert!(!policy.check(&RoleSet::guest(), &path("/api/chats"), Action::Post));
    }

    #[test]
    fn test_from_json_rejects_bad_input() {
        let bad_pattern = r#"[{ "roles": ["a"], "allows": [{ "resources": "api/chats", "permissions": "*" }] }]"#;
        assert!(matches!(
            AccessPolicy::from_json(bad_pattern),
            Err(PolicyError::InvalidPattern { .. })
        ));

        let bad_verb = r#"[{ "roles": ["a"], "allows": [{ "resources": "/api", "permissions": ["jump"] }] }]"#;
        assert!(matches!(AccessPolicy::from_json(bad_verb), Err(PolicyError::Parse(_))));

        let no_roles = r#"[{ "roles": [], "allows": [] }]"#;
        assert!(matches!(AccessPolicy::from_json(no_roles), Err(PolicyError::NoRoles)));
    }

    #[test]
    fn test_duplicate_rules_collapsed() {
        let mut policy = AccessPolicy::chats();
        let before = policy.rules().len();
        let first = policy.rules()[0].clone();
        policy.add(first);
        assert_eq!(policy.rules().len(), before);
    }

    #[test]
    fn test_load_from_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{ "roles": ["moderator"], "allows": [{{ "resources": "/api/chats/:chatId", "permissions": ["delete"] }}] }}]"#
        )
        .unwrap();

        let policy = AccessPolicy::load(file.path()).unwrap();
        assert!(policy.check(&RoleSet::new(["moderator"]), &path("/api/chats/7"), Action::Delete));
        assert!(!policy.check(&RoleSet::new(["moderator"]), &path("/api/chats"), Action::Get));

        let missing = AccessPolicy::load(Path::new("/nonexistent/policy.json"));
        assert!(matches!(missing, Err(PolicyError::Io(_))));
    }
}
