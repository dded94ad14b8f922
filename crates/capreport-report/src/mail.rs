// crates/capreport-report/src/mail.rs
// ============================================================================
// Module: Capreport Mail Seam
// Description: Mailer trait and reference implementations.
// Purpose: Deliver rendered reports without binding the core to a transport.
// Dependencies: thiserror, tracing
// ============================================================================

//! ## Overview
//! [`Mailer`] is the delivery seam for rendered reports. SMTP and provider
//! details stay behind it; the pipeline only knows that delivery either
//! succeeded or failed. [`LogMailer`] records deliveries as structured log
//! events and [`ChannelMailer`] hands them to an in-process receiver, which
//! is what the tests use.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::mpsc::SyncSender;

use thiserror::Error;
use tracing::info;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Mail delivery errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MailError {
    /// Delivery failed.
    #[error("mail delivery failed: {0}")]
    Delivery(String),
}

// ============================================================================
// SECTION: Email
// ============================================================================

/// One rendered report ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEmail {
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Rendered report body.
    pub body: String,
}

// ============================================================================
// SECTION: Mailer Trait
// ============================================================================

/// Delivers rendered reports to a recipient.
pub trait Mailer: Send + Sync {
    /// Delivers the email.
    ///
    /// # Errors
    ///
    /// Returns [`MailError`] when delivery fails; no partial delivery is
    /// reported as success.
    fn send(&self, email: &ReportEmail) -> Result<(), MailError>;
}

// ============================================================================
// SECTION: Implementations
// ============================================================================

/// Mailer that records deliveries as log events.
///
/// The default when no transport is configured; the report still reaches
/// the operator through the log stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

impl LogMailer {
    /// Creates a log-backed mailer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Mailer for LogMailer {
    fn send(&self, email: &ReportEmail) -> Result<(), MailError> {
        info!(
            to = %email.to,
            subject = %email.subject,
            body_bytes = email.body.len(),
            "report email delivered to log"
        );
        Ok(())
    }
}

/// Mailer that hands deliveries to an in-process channel receiver.
#[derive(Debug, Clone)]
pub struct ChannelMailer {
    /// Channel the deliveries are sent through.
    sender: SyncSender<ReportEmail>,
}

impl ChannelMailer {
    /// Creates a channel-backed mailer.
    #[must_use]
    pub const fn new(sender: SyncSender<ReportEmail>) -> Self {
        Self {
            sender,
        }
    }
}

impl Mailer for ChannelMailer {
    fn send(&self, email: &ReportEmail) -> Result<(), MailError> {
        self.sender.try_send(email.clone()).map_err(|err| MailError::Delivery(err.to_string()))
    }
}
