//! Authentication and authorization
//!
//! Authorization is allow-rule RBAC:
//! - a rule names roles, a resource pattern (`/api/chats/:chatId`), and the
//!   actions it permits (`get`, `post`, ... or `*`)
//! - a caller is allowed if any of its roles matches any rule
//! - the creator of an entity bypasses the rules for that entity
//!
//! Callers come from bearer tokens: the admin key, a signed `sess-` token, or
//! nothing at all (guest).

mod caller;
mod ownership;
mod permissions;
mod policy;
mod tokens;

pub use caller::{Caller, RoleSet, GUEST_ROLE};
pub use ownership::{authorize, is_owner, Access, Owned};
pub use permissions::{AccessRule, Action, Permissions};
pub use policy::{AccessEvaluator, AccessPolicy, EvaluationError, PolicyError};
pub use tokens::{
    generate_secret, AdminKey, Authenticator, SessionPayload, SessionToken, Token, TokenError,
    ADMIN_IDENTITY, ADMIN_ROLE, RESERVED_IDENTITY_PREFIX, SESSION_TOKEN_PREFIX,
};
