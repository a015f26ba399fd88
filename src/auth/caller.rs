//! The caller of an operation: a role set plus an optional identity

use std::collections::BTreeSet;
use std::fmt;

/// Role assigned to callers without an authenticated identity
pub const GUEST_ROLE: &str = "guest";

/// A set of role names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleSet {
    roles: BTreeSet<String>,
}

impl RoleSet {
    pub fn new<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    /// The fallback set for unauthenticated callers
    pub fn guest() -> Self {
        Self::new([GUEST_ROLE])
    }

    /// This set, or `{guest}` if it is empty
    pub fn or_guest(self) -> Self {
        if self.roles.is_empty() {
            Self::guest()
        } else {
            self
        }
    }

    pub fn contains(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.roles.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }
}

impl<S: Into<String>> FromIterator<S> for RoleSet {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        RoleSet::new(iter)
    }
}

impl fmt::Display for RoleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let roles: Vec<&str> = self.iter().collect();
        write!(f, "{}", roles.join(","))
    }
}

/// Who is performing an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    identity: Option<String>,
    roles: RoleSet,
}

impl Caller {
    /// An unauthenticated caller with the guest role
    pub fn guest() -> Self {
        Self {
            identity: None,
            roles: RoleSet::guest(),
        }
    }

    /// An authenticated caller. An empty role set falls back to guest.
    pub fn authenticated(identity: impl Into<String>, roles: RoleSet) -> Self {
        Self {
            identity: Some(identity.into()),
            roles: roles.or_guest(),
        }
    }

    /// Build a caller from raw parts, with no guest fallback
    pub fn from_parts(identity: Option<String>, roles: RoleSet) -> Self {
        Self { identity, roles }
    }

    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    pub fn roles(&self) -> &RoleSet {
        &self.roles
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }
}
