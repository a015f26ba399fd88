//! Ownership override and the combined authorization step

use crate::auth::caller::Caller;
use crate::auth::permissions::Action;
use crate::auth::policy::{AccessEvaluator, EvaluationError};
use crate::resources::ResourcePath;
use std::fmt;
use tracing::debug;

/// An entity that may record the identity of its creator
pub trait Owned {
    fn owner(&self) -> Option<&str>;
}

/// Check if the caller created the entity.
///
/// Both sides must carry an identity; two missing identities never match.
pub fn is_owner(entity: &dyn Owned, caller: &Caller) -> bool {
    match (entity.owner(), caller.identity()) {
        (Some(owner), Some(identity)) => owner == identity,
        _ => false,
    }
}

/// Outcome of an authorization check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Caller owns the target entity; rules were not consulted
    Owner,
    /// A role rule allowed the action
    Role,
    Denied,
}

impl Access {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Access::Denied)
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Access::Owner => write!(f, "owner"),
            Access::Role => write!(f, "role"),
            Access::Denied => write!(f, "denied"),
        }
    }
}

/// Authorize `caller` to perform `action` on `resource`.
///
/// `entity` is the already-resolved target for single-entity operations and
/// `None` for collection operations. The ownership override runs first; the
/// evaluator is only consulted when it does not apply.
pub fn authorize(
    evaluator: &dyn AccessEvaluator,
    caller: &Caller,
    resource: &ResourcePath,
    action: Action,
    entity: Option<&dyn Owned>,
) -> Result<Access, EvaluationError> {
    if let Some(entity) = entity {
        if is_owner(entity, caller) {
            debug!(resource = %resource, action = %action, "Ownership override");
            return Ok(Access::Owner);
        }
    }

    if evaluator.is_allowed(caller.roles(), resource, action)? {
        Ok(Access::Role)
    } else {
        Ok(Access::Denied)
    }
}
