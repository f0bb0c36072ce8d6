use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::backend::{
    InputMode, StyleBackend, StyleBackendRef, StyleRequest, DEFAULT_OUTPUT_SUFFIX,
    DEFAULT_STYLE_MODEL, DEFAULT_STYLE_PROMPT,
};
use crate::delay::{DelayRef, StylePacing, TokioDelay};
use crate::error::{StyleError, StyleErrorCode};
use crate::output::{classify_output, persist_output, styled_output_path, BackendOutput};

/// Lifecycle of a styling job. Transitions only move forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Pending,
    WarmUp,
    Attempting { mode: InputMode, attempt: usize },
    BackingOff { mode: InputMode, attempt: usize },
    Succeeded,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Succeeded { output_path: PathBuf, bytes: u64 },
    Failed(StyleError),
}

/// One image-to-image request and everything observed while running it.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleJob {
    input_path: PathBuf,
    model: String,
    prompt: String,
    output_suffix: String,
    mode: InputMode,
    state: JobState,
    attempts: usize,
    backoffs: usize,
    mode_switched: bool,
    history: Vec<JobState>,
    outcome: Option<JobOutcome>,
}

impl StyleJob {
    pub fn new(input_path: impl Into<PathBuf>) -> Self {
        Self {
            input_path: input_path.into(),
            model: DEFAULT_STYLE_MODEL.to_string(),
            prompt: DEFAULT_STYLE_PROMPT.to_string(),
            output_suffix: DEFAULT_OUTPUT_SUFFIX.to_string(),
            mode: InputMode::ImageAndPrompt,
            state: JobState::Pending,
            attempts: 0,
            backoffs: 0,
            mode_switched: false,
            history: vec![JobState::Pending],
            outcome: None,
        }
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        if !model.trim().is_empty() {
            self.model = model.trim().to_string();
        }
        self
    }

    /// Blank prompts keep the default prompt.
    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        if !prompt.trim().is_empty() {
            self.prompt = prompt.trim().to_string();
        }
        self
    }

    pub fn output_suffix(mut self, suffix: impl Into<String>) -> Self {
        let suffix = suffix.into();
        if !suffix.is_empty() {
            self.output_suffix = suffix;
        }
        self
    }

    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    pub fn model_id(&self) -> &str {
        &self.model
    }

    pub fn prompt_text(&self) -> &str {
        &self.prompt
    }

    pub fn output_path(&self) -> PathBuf {
        styled_output_path(&self.input_path, &self.output_suffix)
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }

    pub fn state(&self) -> &JobState {
        &self.state
    }

    /// Backend calls made, across both modes.
    pub fn attempts(&self) -> usize {
        self.attempts
    }

    pub fn backoffs(&self) -> usize {
        self.backoffs
    }

    pub fn mode_switched(&self) -> bool {
        self.mode_switched
    }

    pub fn history(&self) -> &[JobState] {
        &self.history
    }

    pub fn outcome(&self) -> Option<&JobOutcome> {
        self.outcome.as_ref()
    }

    pub fn error(&self) -> Option<&StyleError> {
        match &self.outcome {
            Some(JobOutcome::Failed(error)) => Some(error),
            _ => None,
        }
    }

    fn request(&self) -> StyleRequest {
        StyleRequest {
            model: self.model.clone(),
            prompt: self.prompt.clone(),
            image: match self.mode {
                InputMode::ImageAndPrompt => Some(self.input_path.clone()),
                InputMode::PromptOnly => None,
            },
        }
    }

    fn transition(&mut self, state: JobState) {
        tracing::debug!(from = ?self.state, to = ?state, "styling job transition");
        self.history.push(state.clone());
        self.state = state;
    }

    fn succeed(mut self, output_path: PathBuf, bytes: u64) -> Self {
        self.transition(JobState::Succeeded);
        self.outcome = Some(JobOutcome::Succeeded { output_path, bytes });
        self
    }

    fn fail(mut self, error: StyleError) -> Self {
        self.transition(JobState::Failed);
        self.outcome = Some(JobOutcome::Failed(error));
        self
    }
}

enum AttemptResult {
    Done(StyleJob),
    SwitchMode(StyleJob),
}

/// Drives styling jobs against a backend with a warm-up delay, fixed backoff
/// for rate limits, and a single image-to-prompt-only fallback.
pub struct StylingClient {
    backend: Option<StyleBackendRef>,
    delay: DelayRef,
    pacing: StylePacing,
}

impl StylingClient {
    /// `None` means the build or configuration provides no backend.
    pub fn new(backend: Option<StyleBackendRef>) -> Self {
        Self {
            backend,
            delay: Arc::new(TokioDelay),
            pacing: StylePacing::default(),
        }
    }

    pub fn delay(mut self, delay: DelayRef) -> Self {
        self.delay = delay;
        self
    }

    pub fn pacing(mut self, pacing: StylePacing) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn warm_up(mut self, warm_up: Duration) -> Self {
        self.pacing.warm_up = warm_up;
        self
    }

    pub fn backoff(mut self, backoff: Duration) -> Self {
        self.pacing.backoff = backoff;
        self
    }

    pub fn max_attempts(mut self, max_attempts: usize) -> Self {
        self.pacing.max_attempts = max_attempts;
        self
    }

    pub fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    /// Run a job to a terminal state. Failures are reported in the job.
    pub async fn run(&self, job: StyleJob) -> StyleJob {
        let Some(backend) = self.backend.clone() else {
            return job.fail(StyleError::new(
                StyleErrorCode::BackendUnavailable,
                "image styling backend is not available in this build",
            ));
        };
        if !job.input_path.is_file() {
            let message = format!("input image not found: {}", job.input_path.display());
            return job.fail(StyleError::new(StyleErrorCode::InputMissing, message));
        }

        let mut job = job;
        job.transition(JobState::WarmUp);
        tracing::info!(
            warm_up_secs = self.pacing.warm_up.as_secs(),
            backend = backend.name(),
            "waiting before first styling request"
        );
        self.delay.sleep(self.pacing.warm_up).await;

        loop {
            match self.run_mode(backend.as_ref(), job).await {
                AttemptResult::Done(done) => return done,
                AttemptResult::SwitchMode(mut switched) => {
                    switched.mode = InputMode::PromptOnly;
                    switched.mode_switched = true;
                    tracing::warn!("backend rejected image input, retrying prompt-only");
                    job = switched;
                }
            }
        }
    }

    async fn run_mode(
        &self,
        backend: &dyn StyleBackend,
        mut job: StyleJob,
    ) -> AttemptResult {
        let budget = self.pacing.attempts_per_mode();
        let mut attempt = 0;
        loop {
            attempt += 1;
            job.attempts += 1;
            job.transition(JobState::Attempting {
                mode: job.mode,
                attempt,
            });
            let request = job.request();
            let error = match backend.run(&request).await {
                Ok(raw) => {
                    let output_path = job.output_path();
                    let primary = classify_output(&raw).and_then(BackendOutput::into_primary);
                    let persisted = match primary {
                        Ok(handle) => persist_output(backend, handle, &output_path).await,
                        Err(error) => Err(error),
                    };
                    return AttemptResult::Done(match persisted {
                        Ok(bytes) => {
                            tracing::info!(
                                path = %output_path.display(),
                                bytes,
                                "styled image saved"
                            );
                            job.succeed(output_path, bytes)
                        }
                        Err(error) => job.fail(error),
                    });
                }
                Err(error) => error,
            };

            match error.code {
                StyleErrorCode::RateLimited if attempt < budget => {
                    job.backoffs += 1;
                    job.transition(JobState::BackingOff {
                        mode: job.mode,
                        attempt,
                    });
                    tracing::warn!(
                        attempt,
                        budget,
                        backoff_secs = self.pacing.backoff.as_secs(),
                        "backend rate limited request, backing off"
                    );
                    self.delay.sleep(self.pacing.backoff).await;
                }
                StyleErrorCode::InputModalityRejected
                    if job.mode == InputMode::ImageAndPrompt && !job.mode_switched =>
                {
                    return AttemptResult::SwitchMode(job);
                }
                _ => {
                    tracing::warn!(attempt, error = %error, "styling job failed");
                    return AttemptResult::Done(job.fail(error));
                }
            }
        }
    }
}
