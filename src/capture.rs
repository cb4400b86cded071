use anyhow::Result;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Stream-level failure reasons reported by the host recognition capability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorReason {
    /// Stream reported no speech before its silence timeout
    NoSpeech,
    /// No microphone available
    AudioCapture,
    /// Microphone permission denied
    NotAllowed,
    /// Stream-level network failure
    Network,
    /// Anything outside the fixed taxonomy
    Other,
}

impl ErrorReason {
    /// Parses the capability's wire code ("no-speech", "not-allowed", ...)
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        match code {
            "no-speech" => Self::NoSpeech,
            "audio-capture" => Self::AudioCapture,
            "not-allowed" => Self::NotAllowed,
            "network" => Self::Network,
            other => {
                debug!(code = other, "unrecognized stream error code");
                Self::Other
            }
        }
    }
}

/// Errors surfaced by capture operations
#[derive(Debug, Error)]
pub enum CaptureError {
    /// No recognition capability exists on the host; caller must fall back
    /// to simulation
    #[error("speech recognition not available on this host")]
    Unsupported,

    /// The underlying stream reported an error; the session has stopped
    #[error("recognition stream error: {reason:?}")]
    Stream {
        /// Classified failure reason
        reason: ErrorReason,
    },

    /// Starting or stopping the underlying stream failed
    #[error("recognition backend failure")]
    Backend(#[from] anyhow::Error),
}

/// Transcript fragments produced by the recognition stream.
///
/// Interim fragments may still change; exactly one `Final` ends a successful
/// utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptEvent {
    /// Partial, unstable transcript
    Interim(String),
    /// Stable transcript, ready for correction and confirmation
    Final(String),
}

/// Externally observable session state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureState {
    /// No activation in progress
    Idle,
    /// An activation is live (possibly mid auto-restart)
    Listening,
    /// The stream failed; the session has stopped and will not retry
    Error(ErrorReason),
    /// A user-initiated stop completed; terminal for this activation
    Ended,
}

/// Handle controlling one underlying recognition stream.
///
/// The host capability delivers `result`/`error`/`end` notifications
/// asynchronously; the driver routes them into
/// [`SpeechCaptureSession::on_stream_result`] and friends. Only the session
/// calls `start`/`stop` on this handle, which guarantees at most one active
/// stream per session.
#[cfg_attr(test, mockall::automock)]
pub trait RecognitionBackend {
    /// Begin a continuous, interim-results stream
    ///
    /// # Errors
    /// Returns error if the stream cannot be started
    fn start(&mut self) -> Result<()>;

    /// Request the stream to end; acknowledged later via an `end`
    /// notification
    ///
    /// # Errors
    /// Returns error if the stop request cannot be delivered
    fn stop(&mut self) -> Result<()>;
}

/// Token identifying one scheduled auto-restart.
///
/// Tokens are generation-counted: `stop()` and errors invalidate all
/// outstanding tokens, so a delayed restart firing after a stop is ignored
/// instead of racing the stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartToken(u64);

/// Outcome of a stream-ended notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndOutcome {
    /// User-initiated stop acknowledged; the activation is over
    Ended,
    /// The stream dropped on its own; the driver must call
    /// [`SpeechCaptureSession::fire_restart`] with this token after `delay`
    RestartScheduled {
        /// Token to pass back to `fire_restart`
        token: RestartToken,
        /// How long the driver should wait before firing
        delay: Duration,
    },
}

/// Wraps a continuous recognition stream into a session with explicit
/// states and auto-restart-on-drop behavior.
///
/// The session is a plain single-threaded state machine: the host event
/// loop pushes stream notifications in, and scheduling of the bounded
/// restart delay is delegated back to the driver via [`EndOutcome`].
/// Correctness of the restart-vs-stop race rests on the desired-state flag
/// checked here, not on locks.
pub struct SpeechCaptureSession {
    backend: Box<dyn RecognitionBackend>,
    state: CaptureState,
    /// Desired-state flag: true between `start()` and `stop()`/error
    want_listening: bool,
    restart_delay: Duration,
    /// Bumped on every schedule/cancel; stale tokens never restart
    restart_generation: u64,
    pending_restart: Option<RestartToken>,
}

impl SpeechCaptureSession {
    /// Creates a session over the given backend
    #[must_use]
    pub fn new(backend: Box<dyn RecognitionBackend>, restart_delay: Duration) -> Self {
        Self {
            backend,
            state: CaptureState::Idle,
            want_listening: false,
            restart_delay,
            restart_generation: 0,
            pending_restart: None,
        }
    }

    /// Current externally observable state
    #[must_use]
    pub fn state(&self) -> &CaptureState {
        &self.state
    }

    /// Whether an activation is live
    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.state == CaptureState::Listening
    }

    /// Starts a fresh activation.
    ///
    /// Calling `start()` while already `Listening` is a logged no-op; the
    /// redundant request is dropped rather than rejected so a double-tapped
    /// toggle cannot wedge the session.
    ///
    /// # Errors
    /// Returns error if the backend cannot start the stream
    pub fn start(&mut self) -> Result<(), CaptureError> {
        if self.state == CaptureState::Listening {
            debug!("start() while listening (ignored)");
            return Ok(());
        }

        self.backend.start()?;
        self.want_listening = true;
        self.pending_restart = None;
        info!(from = ?self.state, "capture session: -> Listening");
        self.state = CaptureState::Listening;
        Ok(())
    }

    /// Requests the activation to stop.
    ///
    /// Clears the desired-state flag and cancels any pending restart, so
    /// the `end` notification that follows transitions to `Ended` instead
    /// of re-arming. Safe to call in any state.
    pub fn stop(&mut self) {
        self.want_listening = false;
        self.cancel_pending_restart();

        if let Err(e) = self.backend.stop() {
            // The stream may already be gone; the end notification (or its
            // absence) settles the final state either way.
            warn!(error = %e, "backend stop failed");
        }
        debug!(state = ?self.state, "capture session: stop requested");
    }

    /// Routes one transcript notification from the underlying stream.
    ///
    /// Never changes state. Events that arrive after `stop()` was requested
    /// but before the stream acknowledged it are still delivered; they can
    /// never re-arm listening because only `start()` sets the desired-state
    /// flag.
    pub fn on_stream_result(&mut self, event: TranscriptEvent) -> Option<TranscriptEvent> {
        if self.state == CaptureState::Listening {
            return Some(event);
        }
        debug!(state = ?self.state, "transcript event outside activation (dropped)");
        None
    }

    /// Handles the stream's `end` notification.
    ///
    /// If the user asked to stop, the activation is over. If the stream
    /// dropped on its own (silence timeout and the like), a restart is
    /// scheduled after the bounded delay without leaving `Listening` and
    /// without emitting a spurious `Ended`.
    pub fn on_stream_end(&mut self) -> EndOutcome {
        if self.want_listening && self.state == CaptureState::Listening {
            let token = self.schedule_restart();
            info!(
                delay_ms = self.restart_delay.as_millis(),
                "stream dropped, restart scheduled"
            );
            return EndOutcome::RestartScheduled {
                token,
                delay: self.restart_delay,
            };
        }

        if self.state == CaptureState::Listening {
            info!("capture session: Listening -> Ended");
            self.state = CaptureState::Ended;
        }
        EndOutcome::Ended
    }

    /// Fires a previously scheduled restart. Returns whether the backend
    /// was actually restarted; stale tokens (cancelled by `stop()` or an
    /// error, or superseded by a newer schedule) are ignored.
    ///
    /// # Errors
    /// Returns error if the backend cannot restart the stream
    pub fn fire_restart(&mut self, token: RestartToken) -> Result<bool, CaptureError> {
        if self.pending_restart != Some(token) || !self.want_listening {
            debug!("stale restart token (ignored)");
            return Ok(false);
        }

        self.pending_restart = None;
        self.backend.start()?;
        debug!("stream restarted after drop");
        Ok(true)
    }

    /// Handles a stream-level error: transitions to `Error(reason)` and
    /// stops the session. Errors are not retried within a session; the
    /// caller must re-invoke `start()`.
    pub fn on_stream_error(&mut self, reason: ErrorReason) -> CaptureError {
        warn!(?reason, "capture session: -> Error");
        self.state = CaptureState::Error(reason);
        self.want_listening = false;
        self.cancel_pending_restart();

        if let Err(e) = self.backend.stop() {
            warn!(error = %e, "backend stop after error failed");
        }

        CaptureError::Stream { reason }
    }

    fn schedule_restart(&mut self) -> RestartToken {
        self.restart_generation += 1;
        let token = RestartToken(self.restart_generation);
        self.pending_restart = Some(token);
        token
    }

    fn cancel_pending_restart(&mut self) {
        if self.pending_restart.take().is_some() {
            self.restart_generation += 1;
            debug!("pending restart cancelled");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_millis(100);

    fn listening_session(expected_starts: usize, expected_stops: usize) -> SpeechCaptureSession {
        let mut backend = MockRecognitionBackend::new();
        backend
            .expect_start()
            .times(expected_starts)
            .returning(|| Ok(()));
        backend
            .expect_stop()
            .times(expected_stops)
            .returning(|| Ok(()));

        let mut session = SpeechCaptureSession::new(Box::new(backend), DELAY);
        session.start().unwrap();
        session
    }

    #[test]
    fn test_start_transitions_idle_to_listening() {
        let session = listening_session(1, 0);
        assert_eq!(*session.state(), CaptureState::Listening);
        assert!(session.is_listening());
    }

    #[test]
    fn test_start_while_listening_is_noop() {
        // Backend start expected exactly once even with a second start()
        let mut session = listening_session(1, 0);
        assert!(session.start().is_ok());
        assert_eq!(*session.state(), CaptureState::Listening);
    }

    #[test]
    fn test_start_propagates_backend_failure() {
        let mut backend = MockRecognitionBackend::new();
        backend
            .expect_start()
            .times(1)
            .returning(|| Err(anyhow::anyhow!("device busy")));

        let mut session = SpeechCaptureSession::new(Box::new(backend), DELAY);
        let result = session.start();
        assert!(matches!(result, Err(CaptureError::Backend(_))));
        assert_eq!(*session.state(), CaptureState::Idle);
    }

    #[test]
    fn test_transcript_events_pass_through_while_listening() {
        let mut session = listening_session(1, 0);

        let interim = session.on_stream_result(TranscriptEvent::Interim("hel".to_owned()));
        assert_eq!(interim, Some(TranscriptEvent::Interim("hel".to_owned())));
        assert_eq!(*session.state(), CaptureState::Listening);

        let fin = session.on_stream_result(TranscriptEvent::Final("hello".to_owned()));
        assert_eq!(fin, Some(TranscriptEvent::Final("hello".to_owned())));
        assert_eq!(*session.state(), CaptureState::Listening);
    }

    #[test]
    fn test_interim_after_stop_delivered_but_never_rearms() {
        let mut session = listening_session(1, 1);
        session.stop();

        // The stream has not acknowledged the stop yet; in-flight events
        // are still delivered.
        let event = session.on_stream_result(TranscriptEvent::Interim("late".to_owned()));
        assert_eq!(event, Some(TranscriptEvent::Interim("late".to_owned())));

        // But the acknowledgement ends the activation instead of re-arming.
        assert_eq!(session.on_stream_end(), EndOutcome::Ended);
        assert_eq!(*session.state(), CaptureState::Ended);
    }

    #[test]
    fn test_unexpected_end_schedules_restart_and_stays_listening() {
        let mut session = listening_session(2, 0);

        let outcome = session.on_stream_end();
        let EndOutcome::RestartScheduled { token, delay } = outcome else {
            panic!("expected a scheduled restart, got {outcome:?}");
        };
        assert_eq!(delay, DELAY);
        assert_eq!(*session.state(), CaptureState::Listening);

        // The driver fires after the delay; the backend restarts.
        assert!(session.fire_restart(token).unwrap());
        assert_eq!(*session.state(), CaptureState::Listening);
    }

    #[test]
    fn test_restart_vs_stop_race_ends_cleanly() {
        // stop() requested, then the stream reports "ended": the session
        // must transition to Ended, never back to Listening.
        let mut session = listening_session(1, 1);
        session.stop();

        assert_eq!(session.on_stream_end(), EndOutcome::Ended);
        assert_eq!(*session.state(), CaptureState::Ended);
    }

    #[test]
    fn test_stop_invalidates_scheduled_restart() {
        // Drop schedules a restart, then stop() lands before the delay
        // elapses. The token must be stale: backend start never re-invoked.
        let mut session = listening_session(1, 1);

        let EndOutcome::RestartScheduled { token, .. } = session.on_stream_end() else {
            panic!("expected a scheduled restart");
        };
        session.stop();

        assert!(!session.fire_restart(token).unwrap());
    }

    #[test]
    fn test_newer_schedule_supersedes_older_token() {
        let mut session = listening_session(2, 0);

        let EndOutcome::RestartScheduled { token: first, .. } = session.on_stream_end() else {
            panic!("expected a scheduled restart");
        };
        let EndOutcome::RestartScheduled { token: second, .. } = session.on_stream_end() else {
            panic!("expected a second scheduled restart");
        };

        assert!(!session.fire_restart(first).unwrap());
        assert!(session.fire_restart(second).unwrap());
    }

    #[test]
    fn test_stream_error_stops_session() {
        let mut session = listening_session(1, 1);

        let err = session.on_stream_error(ErrorReason::NotAllowed);
        assert!(matches!(
            err,
            CaptureError::Stream {
                reason: ErrorReason::NotAllowed
            }
        ));
        assert_eq!(*session.state(), CaptureState::Error(ErrorReason::NotAllowed));
        assert!(!session.is_listening());
    }

    #[test]
    fn test_error_cancels_pending_restart() {
        let mut session = listening_session(1, 1);

        let EndOutcome::RestartScheduled { token, .. } = session.on_stream_end() else {
            panic!("expected a scheduled restart");
        };
        session.on_stream_error(ErrorReason::Network);

        assert!(!session.fire_restart(token).unwrap());
    }

    #[test]
    fn test_restart_after_error_requires_fresh_start() {
        let mut session = listening_session(2, 1);

        session.on_stream_error(ErrorReason::NoSpeech);
        assert_eq!(*session.state(), CaptureState::Error(ErrorReason::NoSpeech));

        // A later start() creates a fresh activation.
        session.start().unwrap();
        assert_eq!(*session.state(), CaptureState::Listening);
    }

    #[test]
    fn test_start_after_ended_creates_fresh_activation() {
        let mut session = listening_session(2, 1);

        session.stop();
        session.on_stream_end();
        assert_eq!(*session.state(), CaptureState::Ended);

        session.start().unwrap();
        assert_eq!(*session.state(), CaptureState::Listening);
    }

    #[test]
    fn test_events_dropped_when_idle() {
        let backend = MockRecognitionBackend::new();
        let mut session = SpeechCaptureSession::new(Box::new(backend), DELAY);

        let event = session.on_stream_result(TranscriptEvent::Interim("x".to_owned()));
        assert_eq!(event, None);
    }

    #[test]
    fn test_error_reason_wire_codes() {
        assert_eq!(ErrorReason::from_code("no-speech"), ErrorReason::NoSpeech);
        assert_eq!(ErrorReason::from_code("audio-capture"), ErrorReason::AudioCapture);
        assert_eq!(ErrorReason::from_code("not-allowed"), ErrorReason::NotAllowed);
        assert_eq!(ErrorReason::from_code("network"), ErrorReason::Network);
        assert_eq!(ErrorReason::from_code("aborted"), ErrorReason::Other);
    }

    #[test]
    fn test_stop_tolerates_backend_failure() {
        let mut backend = MockRecognitionBackend::new();
        backend.expect_start().times(1).returning(|| Ok(()));
        backend
            .expect_stop()
            .times(1)
            .returning(|| Err(anyhow::anyhow!("already closed")));

        let mut session = SpeechCaptureSession::new(Box::new(backend), DELAY);
        session.start().unwrap();
        session.stop();

        assert_eq!(session.on_stream_end(), EndOutcome::Ended);
        assert_eq!(*session.state(), CaptureState::Ended);
    }
}
