//! Chatter - poll-based message relay with role-based access control
//!
//! Clients post short text messages and poll for everything created after a
//! cursor. Every request is checked against allow-rules keyed by role, resource
//! path, and HTTP verb; the creator of a message may always read it back.

pub mod auth;
pub mod chats;
pub mod messages;
pub mod resources;
pub mod server;
pub mod storage;

pub use auth::{AccessEvaluator, AccessPolicy, AdminKey, Authenticator, Caller, RoleSet};
pub use chats::{ChatError, ChatService, MessageBatch};
pub use messages::{Cursor, Message, NewMessage};
pub use resources::{ResourcePath, ResourcePattern};
pub use server::{ChatterServer, ChatterServerConfig};
pub use storage::{MemoryStore, MessageStore, PostgresStore};
