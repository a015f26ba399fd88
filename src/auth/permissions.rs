//! Actions, permission sets, and allow rules

use crate::auth::caller::RoleSet;
use crate::resources::{ResourcePath, ResourcePattern};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// HTTP-style verbs that a rule can permit
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
}

impl Action {
    pub const ALL: [Action; 6] = [
        Action::Get,
        Action::Head,
        Action::Post,
        Action::Put,
        Action::Patch,
        Action::Delete,
    ];

    /// Parse a lowercase verb
    pub fn parse(s: &str) -> Option<Action> {
        match s {
            "get" => Some(Action::Get),
            "head" => Some(Action::Head),
            "post" => Some(Action::Post),
            "put" => Some(Action::Put),
            "patch" => Some(Action::Patch),
            "delete" => Some(Action::Delete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Get => "get",
            Action::Head => "head",
            Action::Post => "post",
            Action::Put => "put",
            Action::Patch => "patch",
            Action::Delete => "delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The actions a rule grants: a fixed set, or every action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Permissions {
    /// Wildcard `*`
    All,
    Only(BTreeSet<Action>),
}

impl Permissions {
    pub fn only(actions: impl IntoIterator<Item = Action>) -> Self {
        Permissions::Only(actions.into_iter().collect())
    }

    /// Check if this permission set covers the action
    pub fn permits(&self, action: Action) -> bool {
        match self {
            Permissions::All => true,
            Permissions::Only(actions) => actions.contains(&action),
        }
    }
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Permissions::All => write!(f, "*"),
            Permissions::Only(actions) => {
                let verbs: Vec<&str> = actions.iter().map(Action::as_str).collect();
                write!(f, "{}", verbs.join(","))
            }
        }
    }
}

impl Serialize for Permissions {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Permissions::All => serializer.serialize_str("*"),
            Permissions::Only(actions) => actions.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Permissions {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            One(String),
            Many(Vec<String>),
        }

        let verbs = match Raw::deserialize(deserializer)? {
            Raw::One(s) if s == "*" => return Ok(Permissions::All),
            Raw::One(s) => vec![s],
            Raw::Many(v) => v,
        };

        let mut actions = BTreeSet::new();
        for verb in verbs {
            if verb == "*" {
                return Ok(Permissions::All);
            }
            let action = Action::parse(&verb)
                .ok_or_else(|| serde::de::Error::custom(format!("unknown action '{}'", verb)))?;
            actions.insert(action);
        }
        Ok(Permissions::Only(actions))
    }
}

/// A single allow rule: roles + resource pattern + permissions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRule {
    pub roles: BTreeSet<String>,
    pub resource: ResourcePattern,
    pub permissions: Permissions,
}

impl AccessRule {
    pub fn new<R, S>(roles: R, resource: ResourcePattern, permissions: Permissions) -> Self
    where
        R: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            roles: roles.into_iter().map(Into::into).collect(),
            resource,
            permissions,
        }
    }

    /// Check if this rule lets `role` perform `action` on `resource`
    pub fn allows(&self, role: &str, resource: &ResourcePath, action: Action) -> bool {
        self.roles.contains(role) && self.resource.matches(resource) && self.permissions.permits(action)
    }

    /// Check if this rule lets any of the roles perform `action` on `resource`
    pub fn allows_any(&self, roles: &RoleSet, resource: &ResourcePath, action: Action) -> bool {
        roles.iter().any(|role| self.allows(role, resource, action))
    }
}

impl fmt::Display for AccessRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let roles: Vec<&str> = self.roles.iter().map(String::as_str).collect();
        write!(f, "{} {} {}", roles.join(","), self.resource, self.permissions)
    }
}
