use thiserror::Error;
use tracing::{debug, info};

/// Errors from confirmation actions
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfirmError {
    /// confirm/edit/cancel called with nothing pending. Internal: a correct
    /// presentation layer invokes exactly one action per confirmation shown,
    /// so this should never reach the user.
    #[error("no pending confirmation")]
    NoPending,
}

/// One corrected transcript awaiting a user decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingConfirmation {
    transcript: String,
}

impl PendingConfirmation {
    /// The held transcript
    #[must_use]
    pub fn transcript(&self) -> &str {
        &self.transcript
    }
}

/// Gates dispatch of voice-derived messages behind an explicit user
/// decision: send, edit, or cancel.
///
/// At most one confirmation is pending at a time. Presenting a new
/// transcript discards any prior pending one (last-write-wins); every
/// terminal action clears the pending slot before returning, so no action
/// is valid twice and a failed dispatch downstream can never leave a
/// confirmation dangling.
#[derive(Debug, Default)]
pub struct ConfirmationFlow {
    pending: Option<PendingConfirmation>,
}

impl ConfirmationFlow {
    /// Creates an empty flow
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a confirmation is awaiting a decision
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// The transcript currently awaiting a decision, if any
    #[must_use]
    pub fn pending_transcript(&self) -> Option<&str> {
        self.pending.as_ref().map(PendingConfirmation::transcript)
    }

    /// Holds `transcript` for a user decision, replacing any prior pending
    /// confirmation without notifying its original requester
    pub fn present(&mut self, transcript: String) -> &PendingConfirmation {
        if let Some(discarded) = self.pending.take() {
            debug!(
                discarded = discarded.transcript(),
                "pending confirmation replaced"
            );
        }
        info!(transcript = %transcript, "confirmation presented");
        self.pending
            .insert(PendingConfirmation { transcript })
    }

    /// Consumes the pending confirmation for dispatch as a message
    ///
    /// # Errors
    /// Returns [`ConfirmError::NoPending`] if nothing is pending
    pub fn confirm(&mut self) -> Result<String, ConfirmError> {
        let pending = self.pending.take().ok_or(ConfirmError::NoPending)?;
        info!(transcript = pending.transcript(), "confirmation accepted");
        Ok(pending.transcript)
    }

    /// Consumes the pending confirmation for placement into an editable
    /// input, without dispatch
    ///
    /// # Errors
    /// Returns [`ConfirmError::NoPending`] if nothing is pending
    pub fn edit(&mut self) -> Result<String, ConfirmError> {
        let pending = self.pending.take().ok_or(ConfirmError::NoPending)?;
        info!(transcript = pending.transcript(), "confirmation sent to editor");
        Ok(pending.transcript)
    }

    /// Discards the pending confirmation
    ///
    /// # Errors
    /// Returns [`ConfirmError::NoPending`] if nothing is pending
    pub fn cancel(&mut self) -> Result<(), ConfirmError> {
        let pending = self.pending.take().ok_or(ConfirmError::NoPending)?;
        info!(transcript = pending.transcript(), "confirmation cancelled");
        Ok(())
    }
}
