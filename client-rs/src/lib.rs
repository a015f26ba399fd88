//! Chatter Rust Client
//!
//! A polling client for the Chatter message relay. It asks the server for
//! everything newer than its cursor on a fixed interval, never overlapping
//! requests, and keeps a de-duplicated local view of the conversation.
//!
//! # Example
//!
//! ```no_run
//! use chatter_client::{ChatterClient, ChatterConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ChatterConfig::new("http://localhost:3000").token("sess-...");
//!     let client = ChatterClient::new(config)?;
//!
//!     client.on_message(|message| {
//!         println!("{}: {}", message.author, message.text);
//!     });
//!     client.start();
//!
//!     client.send("hello").await?;
//!
//!     client.stop().await;
//!     Ok(())
//! }
//! ```

mod client;
mod config;
mod error;
mod messages;
mod transport;
mod view;

pub use client::{ChatterClient, MessageHandler, PollState};
pub use config::ChatterConfig;
pub use error::{ChatterError, Result};
pub use messages::{Message, MessageBatch};
pub use transport::{ChatTransport, HttpTransport};
pub use view::MessageView;
