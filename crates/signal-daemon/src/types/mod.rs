//! Wire types exchanged with the signal-cli daemon.

mod envelope;
mod send;

pub use envelope::{DataMessage, Envelope, GroupInfo, ReceiveEvent, Sticker};
pub use send::{Recipient, RecipientResult, SendParams, SendResult};
