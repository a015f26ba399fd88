//! CLI command definitions

use chatter::auth::Action;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "chatter")]
#[command(about = "Poll-based message relay with role-based access control", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database URL (messages are kept in memory when unset)
    #[arg(long, env = "DATABASE_URL", global = true)]
    pub database_url: Option<String>,

    /// Admin key for full access
    #[arg(long, env = "CHATTER_ADMIN_KEY", global = true)]
    pub admin_key: Option<String>,

    /// Access policy file (JSON); the built-in chat policy when unset
    #[arg(long, env = "CHATTER_POLICY", global = true)]
    pub policy: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the chat server
    Serve {
        /// Address to bind to
        #[arg(short, long, default_value = "0.0.0.0:3000", env = "CHATTER_BIND")]
        bind: String,

        /// Session token signing secret
        #[arg(long, env = "CHATTER_SECRET")]
        secret: String,
    },

    /// Mint a session token
    ///
    /// Examples:
    ///   chatter token --user alice --role user
    ///   chatter token --user ops --role user --role moderator
    Token {
        /// User id carried by the token
        #[arg(short, long)]
        user: String,

        /// Role(s) carried by the token (none means guest)
        #[arg(short, long = "role")]
        role: Vec<String>,

        /// Session token signing secret
        #[arg(long, env = "CHATTER_SECRET")]
        secret: String,
    },

    /// Evaluate the access policy for a role set, path and verb
    ///
    /// Examples:
    ///   chatter check --role guest /api/chats post
    ///   chatter check --role user /api/chats/42 get
    Check {
        /// Role(s) to evaluate (none means guest)
        #[arg(short, long = "role")]
        role: Vec<String>,

        /// Concrete resource path
        path: String,

        /// HTTP verb: get, head, post, put, patch, delete
        #[arg(value_parser = parse_action)]
        verb: Action,
    },

    /// Print the effective access rules
    Rules,

    /// Initialize the database schema
    Init,

    /// Print a fresh random signing secret
    Secret,
}

fn parse_action(s: &str) -> Result<Action, String> {
    Action::parse(&s.to_lowercase()).ok_or_else(|| {
        let verbs: Vec<_> = Action::ALL.iter().map(|a| a.as_str()).collect();
        format!("Invalid verb: {}. Must be one of: {}", s, verbs.join(", "))
    })
}
