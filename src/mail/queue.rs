//! Paced outbound email queue.
//!
//! One worker drains an unbounded channel in order, pausing a fixed delay
//! between sends to stay under the provider's rate limit. A failed send is
//! logged and skipped. The worker exits once every [`MailQueue`] handle has
//! been dropped and the channel is empty.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::mail::transport::MailTransport;
use crate::mail::{MailError, OutboundEmail};
use crate::observability::metrics;

/// Handle for enqueueing emails.
#[derive(Clone)]
pub struct MailQueue {
    tx: mpsc::UnboundedSender<OutboundEmail>,
}

impl MailQueue {
    /// Spawn the worker on the current runtime.
    pub fn start(transport: Arc<dyn MailTransport>, delay: Duration) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_worker(transport, delay, rx));
        (Self { tx }, worker)
    }

    /// Queue an email; returns without waiting for delivery.
    pub fn enqueue(&self, email: OutboundEmail) -> Result<(), MailError> {
        self.tx.send(email).map_err(|_| MailError::QueueClosed)
    }
}

async fn run_worker(
    transport: Arc<dyn MailTransport>,
    delay: Duration,
    mut rx: mpsc::UnboundedReceiver<OutboundEmail>,
) {
    let mut first = true;
    while let Some(email) = rx.recv().await {
        if !first && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        first = false;

        match transport.send(&email).await {
            Ok(()) => {
                tracing::info!(to = %email.to, subject = %email.subject, "Email sent");
                metrics::record_email("sent");
            }
            Err(e) => {
                tracing::error!(to = %email.to, error = %e, "Email send failed");
                metrics::record_email("failed");
            }
        }
    }
    tracing::debug!("Mail queue closed");
}
