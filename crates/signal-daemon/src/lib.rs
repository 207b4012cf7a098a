//! Signal-cli daemon client library.
//!
//! Talks to a signal-cli daemon over its HTTP interface:
//!
//! - Sending text and stickers to individuals and groups (JSON-RPC)
//! - Receiving messages via Server-Sent Events, reconnecting on failure
//! - Health checking
//!
//! # Example
//!
//! ```no_run
//! use futures::StreamExt;
//! use signal_daemon::{DaemonConfig, Recipient, SignalClient};
//!
//! # async fn example() -> Result<(), signal_daemon::DaemonError> {
//! let config = DaemonConfig::with_account("http://127.0.0.1:8080", "+1234567890");
//! let client = SignalClient::connect(config).await?;
//!
//! let mut messages = signal_daemon::subscribe(&client)?;
//! while let Some(result) = messages.next().await {
//!     let Ok(envelope) = result else { continue };
//!     if let (Some(to), Some(text)) = (envelope.reply_to(), envelope.text()) {
//!         client.send_message(&to, text).await?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod sse;
pub mod types;

pub use client::SignalClient;
pub use config::{DaemonConfig, DEFAULT_BASE_URL};
pub use error::DaemonError;
pub use sse::{subscribe, subscribe_with_reconnect, MessageStream, ReconnectConfig};
pub use types::*;
