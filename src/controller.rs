use anyhow::Result;
use rand::Rng;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::capture::{
    CaptureError, EndOutcome, ErrorReason, RecognitionBackend, RestartToken,
    SpeechCaptureSession, TranscriptEvent,
};
use crate::config::{CaptureConfig, SimulationConfig};
use crate::confirm::{ConfirmError, ConfirmationFlow};
use crate::correction::TranscriptCorrector;
use crate::dispatch::{ChatReply, MessageDispatcher};

/// User-facing presentation layer.
///
/// The pipeline sends three kinds of signals: live listening status with
/// interim text, a confirmation with the corrected transcript, and error
/// messages. The layer behind this trait must invoke exactly one of
/// confirm/edit/cancel on the controller per confirmation shown.
#[cfg_attr(test, mockall::automock)]
pub trait Presenter {
    /// Show listening status with the latest interim transcript
    fn show_listening(&mut self, interim: &str);
    /// Show the corrected transcript with send/edit/cancel actions
    fn show_confirmation(&mut self, transcript: &str);
    /// Show a transient informational notice
    fn show_notice(&mut self, message: &str);
    /// Show an error message
    fn show_error(&mut self, message: &str);
    /// Place text into the editable message input without sending
    fn fill_input(&mut self, text: &str);
    /// Render the backend's reply
    fn show_reply(&mut self, reply: &ChatReply);
}

/// Seam for picking a simulation question, injectable for deterministic
/// tests
#[cfg_attr(test, mockall::automock)]
pub trait QuestionChooser {
    /// Returns an index into `questions`
    fn choose(&mut self, questions: &[String]) -> usize;
}

/// Production chooser: uniform random selection
#[derive(Debug, Default)]
pub struct RandomChooser;

impl QuestionChooser for RandomChooser {
    fn choose(&mut self, questions: &[String]) -> usize {
        if questions.is_empty() {
            0
        } else {
            rand::thread_rng().gen_range(0..questions.len())
        }
    }
}

/// Message shown when the host has no recognition capability
const UNSUPPORTED_MESSAGE: &str = "Voice input not available. Using simulation mode.";

/// Message shown when the backend refuses to start a stream
const START_FAILED_MESSAGE: &str =
    "Error starting voice input. Please check microphone permissions.";

/// Maps a stream failure reason to its fixed user-visible message
#[must_use]
pub const fn error_message(reason: ErrorReason) -> &'static str {
    match reason {
        ErrorReason::NoSpeech => "Voice input error: No speech detected. Please try again.",
        ErrorReason::AudioCapture => {
            "Voice input error: No microphone found. Please check your audio settings."
        }
        ErrorReason::NotAllowed => {
            "Voice input error: Microphone access denied. Please allow microphone permissions."
        }
        ErrorReason::Network => {
            "Voice input error: Network error occurred. Please check your connection."
        }
        ErrorReason::Other => "Voice input error: Please try again.",
    }
}

/// Composes capture, correction, confirmation and dispatch into one
/// user-facing toggle.
///
/// Constructed once at the application boundary and passed wherever the UI
/// needs to invoke it; the controller holds no global state. The host event
/// loop drives it: backend notifications go to the `on_stream_*` methods,
/// and when [`Self::on_stream_end`] returns a restart token the loop must
/// wait the returned delay and pass the token to [`Self::on_restart_due`].
pub struct VoiceInputController {
    session: Option<SpeechCaptureSession>,
    corrector: TranscriptCorrector,
    confirmation: ConfirmationFlow,
    presenter: Box<dyn Presenter>,
    dispatcher: Box<dyn MessageDispatcher>,
    chooser: Box<dyn QuestionChooser>,
    questions: Vec<String>,
    char_delay: Duration,
}

impl VoiceInputController {
    /// Creates a controller. `backend` is `None` when the host has no
    /// recognition capability; every toggle then runs the simulation
    /// fallback with no loss of the confirmation protocol.
    #[must_use]
    pub fn new(
        backend: Option<Box<dyn RecognitionBackend>>,
        capture: &CaptureConfig,
        simulation: &SimulationConfig,
        corrector: TranscriptCorrector,
        presenter: Box<dyn Presenter>,
        dispatcher: Box<dyn MessageDispatcher>,
        chooser: Box<dyn QuestionChooser>,
    ) -> Self {
        let session = backend.map(|backend| {
            SpeechCaptureSession::new(backend, Duration::from_millis(capture.restart_delay_ms))
        });

        if session.is_none() {
            info!("no recognition capability, simulation fallback active");
        }

        Self {
            session,
            corrector,
            confirmation: ConfirmationFlow::new(),
            presenter,
            dispatcher,
            chooser,
            questions: simulation.questions.clone(),
            char_delay: Duration::from_millis(simulation.char_delay_ms),
        }
    }

    /// Whether a capture activation is live
    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(SpeechCaptureSession::is_listening)
    }

    /// Whether a confirmation is awaiting a decision
    #[must_use]
    pub fn has_pending_confirmation(&self) -> bool {
        self.confirmation.has_pending()
    }

    /// Toggles voice capture on or off. Hosts without a recognition
    /// capability get the scripted simulation instead.
    ///
    /// # Errors
    /// Currently infallible; capture errors are surfaced through the
    /// presenter rather than propagated
    pub async fn toggle(&mut self) -> Result<()> {
        let Some(session) = self.session.as_mut() else {
            self.presenter.show_notice(UNSUPPORTED_MESSAGE);
            return self.run_simulation().await;
        };

        if session.is_listening() {
            info!("toggle: stopping capture");
            session.stop();
            return Ok(());
        }

        match session.start() {
            Ok(()) => {
                info!("toggle: capture started");
                self.presenter.show_listening("");
                Ok(())
            }
            Err(CaptureError::Unsupported) => {
                self.presenter.show_notice(UNSUPPORTED_MESSAGE);
                self.run_simulation().await
            }
            Err(e) => {
                warn!(error = %e, "capture start failed");
                self.presenter.show_error(START_FAILED_MESSAGE);
                Ok(())
            }
        }
    }

    /// Routes one transcript notification from the recognition stream.
    /// Interim text becomes a live status update; final text enters the
    /// correction and confirmation path.
    pub fn on_stream_result(&mut self, event: TranscriptEvent) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let Some(event) = session.on_stream_result(event) else {
            return;
        };

        match event {
            TranscriptEvent::Interim(text) => self.presenter.show_listening(&text),
            TranscriptEvent::Final(text) => self.finish_transcript(&text),
        }
    }

    /// Handles the stream's `end` notification. A returned token means the
    /// stream dropped on its own: the caller must wait `delay` and then
    /// invoke [`Self::on_restart_due`] with the token.
    pub fn on_stream_end(&mut self) -> Option<(RestartToken, Duration)> {
        let session = self.session.as_mut()?;
        match session.on_stream_end() {
            EndOutcome::Ended => {
                debug!("capture activation ended");
                None
            }
            EndOutcome::RestartScheduled { token, delay } => Some((token, delay)),
        }
    }

    /// Fires a restart scheduled by [`Self::on_stream_end`]. Stale tokens
    /// are ignored inside the session.
    pub fn on_restart_due(&mut self, token: RestartToken) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if let Err(e) = session.fire_restart(token) {
            warn!(error = %e, "stream restart failed");
            session.stop();
            self.presenter.show_error(START_FAILED_MESSAGE);
        }
    }

    /// Handles a stream-level error: the session stops and the mapped
    /// message is surfaced. No error propagates past this controller.
    pub fn on_stream_error(&mut self, reason: ErrorReason) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let _ = session.on_stream_error(reason);
        self.presenter.show_error(error_message(reason));
    }

    /// Dispatches the pending confirmation as a message. The pending slot
    /// is cleared before dispatch, so a dispatch failure never leaves a
    /// confirmation dangling.
    ///
    /// # Errors
    /// Currently infallible; dispatch failures are surfaced through the
    /// presenter
    pub fn confirm(&mut self) -> Result<()> {
        let text = match self.confirmation.confirm() {
            Ok(text) => text,
            Err(ConfirmError::NoPending) => {
                warn!("confirm with no pending confirmation (ignored)");
                return Ok(());
            }
        };

        match self.dispatcher.dispatch(&text) {
            Ok(reply) => {
                self.presenter.show_reply(&reply);
            }
            Err(e) => {
                warn!(error = %e, "message dispatch failed");
                self.presenter
                    .show_error("Sorry, I encountered an error. Please try again.");
            }
        }
        Ok(())
    }

    /// Places the pending transcript into the editable input without
    /// dispatching it
    pub fn edit(&mut self) {
        match self.confirmation.edit() {
            Ok(text) => {
                self.presenter.fill_input(&text);
                self.presenter
                    .show_notice("You can now edit the text before sending");
            }
            Err(ConfirmError::NoPending) => {
                warn!("edit with no pending confirmation (ignored)");
            }
        }
    }

    /// Discards the pending transcript
    pub fn cancel(&mut self) {
        match self.confirmation.cancel() {
            Ok(()) => self.presenter.show_notice("Voice input cancelled"),
            Err(ConfirmError::NoPending) => {
                warn!("cancel with no pending confirmation (ignored)");
            }
        }
    }

    /// Scripted substitute for real capture: one sample question revealed
    /// character by character as interim status, then fed through the same
    /// correction and confirmation path as a real final transcript.
    async fn run_simulation(&mut self) -> Result<()> {
        if self.questions.is_empty() {
            warn!("simulation requested but no sample questions configured");
            return Ok(());
        }

        let idx = self
            .chooser
            .choose(&self.questions)
            .min(self.questions.len() - 1);
        let question = self.questions[idx].clone();
        info!(question = %question, "simulating voice recognition");
        self.presenter.show_notice("Simulating voice recognition...");

        let mut revealed = String::with_capacity(question.len());
        for ch in question.chars() {
            revealed.push(ch);
            self.presenter.show_listening(&revealed);
            if !self.char_delay.is_zero() {
                tokio::time::sleep(self.char_delay).await;
            }
        }

        self.finish_transcript(&question);
        Ok(())
    }

    /// Shared tail of the real and simulated paths: correct, then hold for
    /// confirmation
    fn finish_transcript(&mut self, raw: &str) {
        let corrected = self.corrector.correct(raw.trim());
        self.confirmation.present(corrected.clone());
        self.presenter.show_confirmation(&corrected);
    }
}
