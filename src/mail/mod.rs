//! Outbound email subsystem.
//!
//! # Data Flow
//! ```text
//! handler
//!     → templates.rs (render subject/text/html)
//!     → queue.rs (enqueue, returns immediately)
//!     → worker: transport.rs (HTTP API or log), fixed delay between sends
//! ```

pub mod queue;
pub mod templates;
pub mod transport;

use serde::Serialize;
use thiserror::Error;

pub use queue::MailQueue;
pub use transport::{HttpMailer, LogMailer, MailTransport, MemoryMailer};

/// A rendered email ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail transport error: {0}")]
    Transport(String),

    #[error("mail provider rejected message with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("mail queue is closed")]
    QueueClosed,
}
