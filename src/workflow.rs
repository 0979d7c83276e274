use anyhow::{anyhow, Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::error::BoardError;
use crate::models::{ApplicationDraft, JobApplication, PersonalDetails};
use crate::store::JobStore;

pub const MAX_RESUME_BYTES: u64 = 5 * 1024 * 1024;
pub const MIN_COVER_LETTER_CHARS: usize = 100;
pub const RESUME_EXTENSIONS: &[&str] = &["pdf", "doc", "docx"];
pub const DEFAULT_FAILURE_RATE: f64 = 0.1;
pub const DEFAULT_SUBMIT_DELAY: Duration = Duration::from_millis(1500);

static EMAIL_PATTERN: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"\S+@\S+\.\S+").expect("email pattern compiles"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Step {
    PersonalDetails,
    Resume,
    CoverLetter,
}

impl Step {
    pub const COUNT: u8 = 3;

    pub fn number(self) -> u8 {
        match self {
            Step::PersonalDetails => 1,
            Step::Resume => 2,
            Step::CoverLetter => 3,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Step::PersonalDetails => "Personal Details",
            Step::Resume => "Resume",
            Step::CoverLetter => "Cover Letter",
        }
    }

    fn next(self) -> Option<Step> {
        match self {
            Step::PersonalDetails => Some(Step::Resume),
            Step::Resume => Some(Step::CoverLetter),
            Step::CoverLetter => None,
        }
    }

    fn prev(self) -> Option<Step> {
        match self {
            Step::PersonalDetails => None,
            Step::Resume => Some(Step::PersonalDetails),
            Step::CoverLetter => Some(Step::Resume),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Editing(Step),
    Submitting,
    Success,
}

/// A resume picked from disk. Only metadata is read; nothing is uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeAttachment {
    pub file_name: String,
    pub size_bytes: u64,
    pub location: String,
}

impl ResumeAttachment {
    pub fn from_path(path: &Path) -> Result<Self> {
        let metadata = std::fs::metadata(path)
            .with_context(|| format!("Failed to read resume file: {}", path.display()))?;
        if !metadata.is_file() {
            return Err(anyhow!("Resume path is not a file: {}", path.display()));
        }
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| anyhow!("Resume path has no file name: {}", path.display()))?;
        let absolute = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        Ok(Self {
            file_name,
            size_bytes: metadata.len(),
            location: format!("file://{}", absolute.display()),
        })
    }

    fn extension(&self) -> Option<String> {
        Path::new(&self.file_name)
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplicationForm {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub resume: Option<ResumeAttachment>,
    pub cover_letter: String,
}

/// Per-field messages; `None` means the field is fine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub resume: Option<String>,
    pub cover_letter: Option<String>,
}

impl FieldErrors {
    pub fn is_empty(&self) -> bool {
        self.messages().is_empty()
    }

    pub fn messages(&self) -> Vec<(&'static str, &str)> {
        [
            ("name", &self.name),
            ("email", &self.email),
            ("phone", &self.phone),
            ("resume", &self.resume),
            ("cover letter", &self.cover_letter),
        ]
        .into_iter()
        .filter_map(|(field, msg)| msg.as_deref().map(|m| (field, m)))
        .collect()
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self.messages().into_iter().map(|(_, m)| m).collect();
        f.write_str(&messages.join("; "))
    }
}

fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

fn check_resume(resume: &ResumeAttachment) -> Option<String> {
    if resume.size_bytes > MAX_RESUME_BYTES {
        return Some("File size must be less than 5MB".to_string());
    }
    match resume.extension() {
        Some(ext) if RESUME_EXTENSIONS.contains(&ext.as_str()) => None,
        _ => Some("Resume must be a PDF or Word document".to_string()),
    }
}

/// Checks only the fields that belong to `step`.
pub fn validate_step(step: Step, form: &ApplicationForm) -> FieldErrors {
    let mut errors = FieldErrors::default();

    match step {
        Step::PersonalDetails => {
            if form.name.trim().is_empty() {
                errors.name = Some("Name is required".to_string());
            }

            if form.email.trim().is_empty() {
                errors.email = Some("Email is required".to_string());
            } else if !is_valid_email(&form.email) {
                errors.email = Some("Email is invalid".to_string());
            }

            if form.phone.trim().is_empty() {
                errors.phone = Some("Phone number is required".to_string());
            }
        }
        Step::Resume => match &form.resume {
            None => errors.resume = Some("Resume is required".to_string()),
            Some(resume) => errors.resume = check_resume(resume),
        },
        Step::CoverLetter => {
            let letter = form.cover_letter.trim();
            if letter.is_empty() {
                errors.cover_letter = Some("Cover letter is required".to_string());
            } else if letter.chars().count() < MIN_COVER_LETTER_CHARS {
                errors.cover_letter = Some(format!(
                    "Cover letter must be at least {} characters",
                    MIN_COVER_LETTER_CHARS
                ));
            }
        }
    }

    errors
}

/// Decides whether a simulated submission fails.
#[derive(Debug, Clone)]
pub struct FailureInjector {
    probability: f64,
    rng: StdRng,
}

impl FailureInjector {
    pub fn new(probability: f64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            probability: probability.clamp(0.0, 1.0),
            rng,
        }
    }

    #[cfg(test)]
    pub fn never() -> Self {
        Self::new(0.0, Some(0))
    }

    #[cfg(test)]
    pub fn always() -> Self {
        Self::new(1.0, Some(0))
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }

    pub fn should_fail(&mut self) -> bool {
        self.rng.gen_bool(self.probability)
    }
}

/// Holds the workflow in `Submitting` while a submission is in flight. Unless
/// completed, dropping it (failure, or the future being cancelled) puts the
/// workflow back on the cover letter step.
struct SubmitGuard<'a> {
    state: &'a mut WorkflowState,
    completed: bool,
}

impl<'a> SubmitGuard<'a> {
    fn enter(state: &'a mut WorkflowState) -> Self {
        *state = WorkflowState::Submitting;
        Self {
            state,
            completed: false,
        }
    }

    fn complete(mut self) {
        *self.state = WorkflowState::Success;
        self.completed = true;
    }
}

impl Drop for SubmitGuard<'_> {
    fn drop(&mut self) {
        if !self.completed {
            *self.state = WorkflowState::Editing(Step::CoverLetter);
        }
    }
}

/// The three-step apply flow for one job.
#[derive(Debug, Clone)]
pub struct ApplicationWorkflow {
    job_id: String,
    state: WorkflowState,
    form: ApplicationForm,
    errors: FieldErrors,
    submit_delay: Duration,
}

impl ApplicationWorkflow {
    /// Refuses unknown jobs and jobs already applied to.
    pub fn begin(store: &JobStore, job_id: &str) -> Result<Self, BoardError> {
        if store.get_job_by_id(job_id).is_none() {
            return Err(BoardError::NotFound(job_id.to_string()));
        }
        if store.is_job_applied(job_id) {
            info!(job_id, "Already applied, not starting workflow");
            return Err(BoardError::AlreadyApplied(job_id.to_string()));
        }
        Ok(Self {
            job_id: job_id.to_string(),
            state: WorkflowState::Editing(Step::PersonalDetails),
            form: ApplicationForm::default(),
            errors: FieldErrors::default(),
            submit_delay: DEFAULT_SUBMIT_DELAY,
        })
    }

    pub fn with_submit_delay(mut self, delay: Duration) -> Self {
        self.submit_delay = delay;
        self
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    pub fn form(&self) -> &ApplicationForm {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut ApplicationForm {
        &mut self.form
    }

    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    pub fn progress(&self) -> u8 {
        let step = match self.state {
            WorkflowState::Editing(step) => step.number(),
            WorkflowState::Submitting | WorkflowState::Success => Step::COUNT,
        };
        ((step as u32 * 100) / Step::COUNT as u32) as u8
    }

    /// Attaches a resume, rejecting it up front if it is too large or of the
    /// wrong type. A rejected file leaves any previous attachment in place.
    pub fn attach_resume(&mut self, resume: ResumeAttachment) -> Result<(), BoardError> {
        if let Some(message) = check_resume(&resume) {
            debug!(file = %resume.file_name, size = resume.size_bytes, "Rejected resume");
            self.errors.resume = Some(message);
            return Err(BoardError::Validation(FieldErrors {
                resume: self.errors.resume.clone(),
                ..Default::default()
            }));
        }
        self.form.resume = Some(resume);
        self.errors.resume = None;
        Ok(())
    }

    pub fn next(&mut self) -> Result<Step, BoardError> {
        let WorkflowState::Editing(step) = self.state else {
            return Err(BoardError::InvalidTransition("no step to advance from"));
        };
        let next = step
            .next()
            .ok_or(BoardError::InvalidTransition("the last step is submitted, not advanced"))?;

        self.errors = validate_step(step, &self.form);
        if !self.errors.is_empty() {
            return Err(BoardError::Validation(self.errors.clone()));
        }
        self.state = WorkflowState::Editing(next);
        Ok(next)
    }

    pub fn back(&mut self) -> Result<Step, BoardError> {
        let WorkflowState::Editing(step) = self.state else {
            return Err(BoardError::InvalidTransition("cannot go back from here"));
        };
        let prev = step.prev().unwrap_or(step);
        self.state = WorkflowState::Editing(prev);
        Ok(prev)
    }

    /// Validates the cover letter, waits out the simulated network call and
    /// records the application. A simulated failure leaves the workflow on the
    /// last step so the user can retry.
    pub async fn submit(
        &mut self,
        store: &mut JobStore,
        clock: &dyn Clock,
        failures: &mut FailureInjector,
    ) -> Result<JobApplication, BoardError> {
        if self.state != WorkflowState::Editing(Step::CoverLetter) {
            return Err(BoardError::InvalidTransition("submission is only possible from the cover letter step"));
        }

        self.errors = validate_step(Step::CoverLetter, &self.form);
        if !self.errors.is_empty() {
            return Err(BoardError::Validation(self.errors.clone()));
        }

        let state = SubmitGuard::enter(&mut self.state);
        debug!(
            job_id = %self.job_id,
            delay_ms = self.submit_delay.as_millis() as u64,
            failure_rate = failures.probability(),
            "Submitting application"
        );
        clock.sleep(self.submit_delay).await;

        if failures.should_fail() {
            warn!(job_id = %self.job_id, "Simulated submission failure");
            return Err(BoardError::SubmissionFailed);
        }

        let draft = ApplicationDraft {
            personal_details: PersonalDetails {
                name: self.form.name.trim().to_string(),
                email: self.form.email.trim().to_string(),
                phone: self.form.phone.trim().to_string(),
            },
            resume_url: self.form.resume.as_ref().map(|r| r.location.clone()),
            cover_letter: Some(self.form.cover_letter.trim().to_string()),
        };
        let application = store.apply_to_job(&self.job_id, draft).clone();
        state.complete();
        info!(job_id = %self.job_id, "Application submitted");
        Ok(application)
    }
}
