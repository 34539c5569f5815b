//! Lifecycle of a single conversion job, folded into one observable status.
//!
//! The session subscribes to all three event channels once at construction
//! and keeps those subscriptions for its whole lifetime; each started job is
//! tagged with a fresh [`JobId`] and events carrying any other id are
//! discarded, so stale deliveries from a finished or reset job can never
//! corrupt the current one.

use crate::gateway::event::Subscription;
use crate::gateway::{CommandError, CommandGateway, EventGateway};
use crate::options::ConversionOptions;
use crate::protocol::JobId;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

const STARTING_MESSAGE: &str = "starting";
const SUCCESS_MESSAGE: &str = "conversion complete";

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("a conversion is already in progress")]
    Busy,
    #[error(transparent)]
    Start(#[from] CommandError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Converting,
    Done,
    Error,
}

/// Read-only snapshot handed to callers; only the session mutates the
/// underlying state.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionStatus {
    pub phase: Phase,
    pub progress: f64,
    pub message: String,
    pub output_path: Option<PathBuf>,
}

#[derive(Debug)]
enum SessionState {
    Idle,
    Converting {
        job: JobId,
        progress: f64,
        message: String,
    },
    Done {
        output_path: PathBuf,
        message: String,
    },
    Error {
        message: String,
        progress: f64,
    },
}

struct SessionInner {
    state: SessionState,
}

impl SessionInner {
    fn active_job(&self) -> Option<JobId> {
        match &self.state {
            SessionState::Converting { job, .. } => Some(*job),
            _ => None,
        }
    }

    fn accepts(&self, job: JobId) -> bool {
        self.active_job() == Some(job)
    }

    fn apply_progress(&mut self, job: JobId, percentage: f64, event_message: &str) {
        if !self.accepts(job) {
            tracing::debug!(%job, "discarding progress event for inactive job");
            return;
        }
        if let SessionState::Converting {
            progress, message, ..
        } = &mut self.state
        {
            // Applied as received; monotonicity is the backend's contract.
            *progress = percentage;
            *message = event_message.to_string();
        }
    }

    fn apply_completed(&mut self, job: JobId, output_path: &Path) {
        if !self.accepts(job) {
            tracing::debug!(%job, "discarding completion event for inactive job");
            return;
        }
        self.state = SessionState::Done {
            output_path: output_path.to_path_buf(),
            message: SUCCESS_MESSAGE.to_string(),
        };
    }

    fn apply_failed(&mut self, job: JobId, error: &str) {
        if !self.accepts(job) {
            tracing::debug!(%job, "discarding failure event for inactive job");
            return;
        }
        let last_progress = match &self.state {
            SessionState::Converting { progress, .. } => *progress,
            _ => 0.0,
        };
        self.state = SessionState::Error {
            message: error.to_string(),
            progress: last_progress,
        };
    }

    fn snapshot(&self) -> ConversionStatus {
        match &self.state {
            SessionState::Idle => ConversionStatus {
                phase: Phase::Idle,
                progress: 0.0,
                message: String::new(),
                output_path: None,
            },
            SessionState::Converting {
                progress, message, ..
            } => ConversionStatus {
                phase: Phase::Converting,
                progress: *progress,
                message: message.clone(),
                output_path: None,
            },
            SessionState::Done {
                output_path,
                message,
            } => ConversionStatus {
                phase: Phase::Done,
                progress: 100.0,
                message: message.clone(),
                output_path: Some(output_path.clone()),
            },
            SessionState::Error { message, progress } => ConversionStatus {
                phase: Phase::Error,
                progress: *progress,
                message: message.clone(),
                output_path: None,
            },
        }
    }
}

fn lock(inner: &Mutex<SessionInner>) -> MutexGuard<'_, SessionInner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct ConversionSession {
    inner: Arc<Mutex<SessionInner>>,
    commands: Arc<dyn CommandGateway>,
    // Held for the session's lifetime; dropping the session unsubscribes.
    _subscriptions: [Subscription; 3],
}

impl ConversionSession {
    pub fn new(commands: Arc<dyn CommandGateway>, events: &EventGateway) -> Self {
        let inner = Arc::new(Mutex::new(SessionInner {
            state: SessionState::Idle,
        }));

        let sink = Arc::clone(&inner);
        let on_progress = events.on_progress(move |job, payload| {
            lock(&sink).apply_progress(job, payload.percentage, &payload.message);
        });

        let sink = Arc::clone(&inner);
        let on_completion = events.on_completion(move |job, path| {
            lock(&sink).apply_completed(job, path);
        });

        let sink = Arc::clone(&inner);
        let on_failure = events.on_failure(move |job, error| {
            lock(&sink).apply_failed(job, error);
        });

        Self {
            inner,
            commands,
            _subscriptions: [on_progress, on_completion, on_failure],
        }
    }

    /// Starts a new job. Rejected with [`SessionError::Busy`] while a job is
    /// already running; a synchronous start failure lands the session in the
    /// error state with the failure's message.
    pub async fn convert(
        &self,
        input: &Path,
        output_dir: &Path,
        options: ConversionOptions,
    ) -> Result<JobId, SessionError> {
        let job = JobId::new();
        {
            let mut inner = lock(&self.inner);
            if matches!(inner.state, SessionState::Converting { .. }) {
                return Err(SessionError::Busy);
            }
            inner.state = SessionState::Converting {
                job,
                progress: 0.0,
                message: STARTING_MESSAGE.to_string(),
            };
        }

        tracing::info!(%job, input = %input.display(), "starting conversion");

        match self
            .commands
            .start_conversion(job, input, output_dir, &options)
            .await
        {
            Ok(()) => Ok(job),
            Err(err) => {
                let mut inner = lock(&self.inner);
                if inner.accepts(job) {
                    inner.state = SessionState::Error {
                        message: err.to_string(),
                        progress: 0.0,
                    };
                }
                tracing::error!(%job, error = %err, "conversion failed to start");
                Err(SessionError::Start(err))
            }
        }
    }

    /// Returns a terminal state to idle. No-op from idle, and from
    /// converting: this core has no backend cancellation, so clearing the
    /// status mid-job would only orphan the running encoder.
    pub fn reset(&self) {
        let mut inner = lock(&self.inner);
        match inner.state {
            SessionState::Done { .. } | SessionState::Error { .. } => {
                inner.state = SessionState::Idle;
            }
            SessionState::Idle => {}
            SessionState::Converting { .. } => {
                tracing::warn!("reset ignored while a conversion is running");
            }
        }
    }

    pub fn snapshot(&self) -> ConversionStatus {
        lock(&self.inner).snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::EventEnvelope;
    use async_trait::async_trait;

    #[derive(Default)]
    struct StubGateway {
        fail_start_with: Mutex<Option<CommandError>>,
        started: Mutex<Vec<JobId>>,
    }

    impl StubGateway {
        fn failing(error: CommandError) -> Self {
            Self {
                fail_start_with: Mutex::new(Some(error)),
                started: Mutex::new(Vec::new()),
            }
        }

        fn started_jobs(&self) -> Vec<JobId> {
            self.started.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CommandGateway for StubGateway {
        async fn pick_input_file(&self) -> Result<Option<PathBuf>, CommandError> {
            Ok(None)
        }

        async fn pick_output_directory(&self) -> Result<Option<PathBuf>, CommandError> {
            Ok(None)
        }

        async fn check_backend_available(&self) -> bool {
            true
        }

        async fn start_conversion(
            &self,
            job: JobId,
            _input: &Path,
            _output_dir: &Path,
            _options: &ConversionOptions,
        ) -> Result<(), CommandError> {
            if let Some(err) = self.fail_start_with.lock().unwrap().take() {
                return Err(err);
            }
            self.started.lock().unwrap().push(job);
            Ok(())
        }
    }

    fn harness() -> (ConversionSession, EventGateway, Arc<StubGateway>) {
        let gateway = Arc::new(StubGateway::default());
        let events = EventGateway::new();
        let session = ConversionSession::new(Arc::clone(&gateway) as _, &events);
        (session, events, gateway)
    }

    async fn start(session: &ConversionSession) -> JobId {
        session
            .convert(
                Path::new("/videos/clip.mp4"),
                Path::new("/videos/out"),
                ConversionOptions::default(),
            )
            .await
            .expect("convert must be accepted from a non-converting state")
    }

    #[tokio::test]
    async fn fresh_session_is_idle() {
        let (session, _events, _gateway) = harness();
        let status = session.snapshot();
        assert_eq!(status.phase, Phase::Idle);
        assert_eq!(status.progress, 0.0);
        assert_eq!(status.message, "");
        assert_eq!(status.output_path, None);
    }

    #[tokio::test]
    async fn convert_enters_converting_before_any_event() {
        let (session, _events, gateway) = harness();
        let job = start(&session).await;

        let status = session.snapshot();
        assert_eq!(status.phase, Phase::Converting);
        assert_eq!(status.progress, 0.0);
        assert_eq!(status.message, "starting");
        assert_eq!(gateway.started_jobs(), vec![job]);
    }

    #[tokio::test]
    async fn progress_then_completion_reaches_done() {
        let (session, events, _gateway) = harness();
        let publisher = events.publisher();
        let job = start(&session).await;

        let failures = Arc::new(Mutex::new(0u32));
        let sink = Arc::clone(&failures);
        let _watch = events.on_failure(move |_, _| *sink.lock().unwrap() += 1);

        for pct in [10.0, 45.0, 80.0] {
            publisher.publish(EventEnvelope::progress(job, pct, "converting", "working"));
            assert_eq!(session.snapshot().progress, pct);
        }

        publisher.publish(EventEnvelope::completed(job, PathBuf::from("/out/x.gif")));

        let status = session.snapshot();
        assert_eq!(status.phase, Phase::Done);
        assert_eq!(status.progress, 100.0);
        assert_eq!(status.output_path, Some(PathBuf::from("/out/x.gif")));
        assert_eq!(*failures.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn failure_reaches_error_without_reporting_success() {
        let (session, events, _gateway) = harness();
        let publisher = events.publisher();
        let job = start(&session).await;

        publisher.publish(EventEnvelope::progress(job, 60.0, "converting", "working"));
        publisher.publish(EventEnvelope::failed(job, "encoder not found"));

        let status = session.snapshot();
        assert_eq!(status.phase, Phase::Error);
        assert_eq!(status.message, "encoder not found");
        assert!(status.progress < 100.0);
        assert_eq!(status.output_path, None);
    }

    #[tokio::test]
    async fn reset_from_terminal_states_is_idempotent() {
        let (session, events, _gateway) = harness();
        let publisher = events.publisher();

        let job = start(&session).await;
        publisher.publish(EventEnvelope::completed(job, PathBuf::from("/out/a.gif")));
        assert_eq!(session.snapshot().phase, Phase::Done);

        session.reset();
        session.reset();
        let status = session.snapshot();
        assert_eq!(status.phase, Phase::Idle);
        assert_eq!(status.progress, 0.0);
        assert_eq!(status.message, "");
        assert_eq!(status.output_path, None);

        let job = start(&session).await;
        publisher.publish(EventEnvelope::failed(job, "disk full"));
        assert_eq!(session.snapshot().phase, Phase::Error);

        session.reset();
        assert_eq!(session.snapshot().phase, Phase::Idle);
    }

    #[tokio::test]
    async fn stale_job_events_are_discarded() {
        let (session, events, _gateway) = harness();
        let publisher = events.publisher();

        let first = start(&session).await;
        publisher.publish(EventEnvelope::completed(first, PathBuf::from("/out/a.gif")));
        session.reset();

        let second = start(&session).await;
        assert_ne!(first, second);

        // Stray deliveries from the finished job must not touch the new one.
        publisher.publish(EventEnvelope::progress(first, 99.0, "converting", "stale"));
        publisher.publish(EventEnvelope::failed(first, "stale failure"));

        let status = session.snapshot();
        assert_eq!(status.phase, Phase::Converting);
        assert_eq!(status.progress, 0.0);
        assert_eq!(status.message, "starting");

        publisher.publish(EventEnvelope::progress(second, 25.0, "converting", "working"));
        assert_eq!(session.snapshot().progress, 25.0);
    }

    #[tokio::test]
    async fn events_after_terminal_event_are_ignored() {
        let (session, events, _gateway) = harness();
        let publisher = events.publisher();
        let job = start(&session).await;

        publisher.publish(EventEnvelope::completed(job, PathBuf::from("/out/x.gif")));
        publisher.publish(EventEnvelope::progress(job, 55.0, "converting", "late"));
        publisher.publish(EventEnvelope::failed(job, "late failure"));

        let status = session.snapshot();
        assert_eq!(status.phase, Phase::Done);
        assert_eq!(status.progress, 100.0);
        assert_eq!(status.output_path, Some(PathBuf::from("/out/x.gif")));
    }

    #[tokio::test]
    async fn out_of_order_progress_is_applied_as_received() {
        let (session, events, _gateway) = harness();
        let publisher = events.publisher();
        let job = start(&session).await;

        publisher.publish(EventEnvelope::progress(job, 50.0, "converting", "half"));
        publisher.publish(EventEnvelope::progress(job, 10.0, "converting", "rewound"));

        let status = session.snapshot();
        assert_eq!(status.phase, Phase::Converting);
        assert_eq!(status.progress, 10.0);
        assert_eq!(status.message, "rewound");
    }

    #[tokio::test]
    async fn convert_while_converting_is_rejected() {
        let (session, _events, gateway) = harness();
        let job = start(&session).await;

        let err = session
            .convert(
                Path::new("/videos/other.mp4"),
                Path::new("/videos/out"),
                ConversionOptions::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Busy));

        // The running job is untouched and no second job was started.
        let status = session.snapshot();
        assert_eq!(status.phase, Phase::Converting);
        assert_eq!(gateway.started_jobs(), vec![job]);
    }

    #[tokio::test]
    async fn synchronous_start_failure_lands_in_error() {
        let gateway = Arc::new(StubGateway::failing(CommandError::BackendUnavailable));
        let events = EventGateway::new();
        let session = ConversionSession::new(Arc::clone(&gateway) as _, &events);

        let err = session
            .convert(
                Path::new("/videos/clip.mp4"),
                Path::new("/videos/out"),
                ConversionOptions::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Start(_)));

        let status = session.snapshot();
        assert_eq!(status.phase, Phase::Error);
        assert_eq!(status.message, "FFmpeg not found or not accessible");
        assert!(gateway.started_jobs().is_empty());

        // Still recoverable: reset then start again.
        session.reset();
        let job = start(&session).await;
        assert_eq!(gateway.started_jobs(), vec![job]);
    }

    #[tokio::test]
    async fn convert_restarts_from_terminal_states_without_reset() {
        let (session, events, _gateway) = harness();
        let publisher = events.publisher();

        let first = start(&session).await;
        publisher.publish(EventEnvelope::failed(first, "boom"));
        assert_eq!(session.snapshot().phase, Phase::Error);

        let second = start(&session).await;
        let status = session.snapshot();
        assert_eq!(status.phase, Phase::Converting);
        assert_eq!(status.progress, 0.0);

        publisher.publish(EventEnvelope::completed(second, PathBuf::from("/out/b.gif")));
        assert_eq!(session.snapshot().phase, Phase::Done);
    }

    #[tokio::test]
    async fn dropping_the_session_releases_its_subscriptions() {
        use crate::protocol::EventChannel;

        let events = EventGateway::new();
        let publisher = events.publisher();
        {
            let gateway = Arc::new(StubGateway::default());
            let _session = ConversionSession::new(gateway as _, &events);
            assert_eq!(events.subscriber_count(EventChannel::Progress), 1);
            assert_eq!(events.subscriber_count(EventChannel::Complete), 1);
            assert_eq!(events.subscriber_count(EventChannel::Error), 1);
        }
        assert_eq!(events.subscriber_count(EventChannel::Progress), 0);
        assert_eq!(events.subscriber_count(EventChannel::Complete), 0);
        assert_eq!(events.subscriber_count(EventChannel::Error), 0);

        publisher.publish(EventEnvelope::failed(JobId::new(), "nobody listening"));
    }

    #[tokio::test]
    async fn reset_while_converting_is_ignored() {
        let (session, events, _gateway) = harness();
        let publisher = events.publisher();
        let job = start(&session).await;

        session.reset();
        assert_eq!(session.snapshot().phase, Phase::Converting);

        // The job is still live and finishes normally.
        publisher.publish(EventEnvelope::completed(job, PathBuf::from("/out/x.gif")));
        assert_eq!(session.snapshot().phase, Phase::Done);
    }
}
