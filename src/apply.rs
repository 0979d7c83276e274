use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use tracing::debug;

use crate::clock::Clock;
use crate::error::BoardError;
use crate::models::JobApplication;
use crate::store::JobStore;
use crate::workflow::{
    ApplicationWorkflow, FailureInjector, FieldErrors, ResumeAttachment, Step, WorkflowState,
};

/// Answers given on the command line. Anything left out is asked for.
#[derive(Debug, Clone, Default)]
pub struct ApplyInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub resume: Option<PathBuf>,
    pub cover_letter: Option<String>,
}

/// Where missing or rejected answers come from.
pub trait Prompter {
    fn interactive(&self) -> bool;
    fn input(&mut self, prompt: &str, initial: &str) -> Result<String>;
    /// Asked before filling in steps 2 and 3. False means go back a step.
    fn proceed(&mut self, step: Step) -> Result<bool>;
    fn retry(&mut self) -> Result<bool>;
}

pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn interactive(&self) -> bool {
        true
    }

    fn input(&mut self, prompt: &str, initial: &str) -> Result<String> {
        dialoguer::Input::new()
            .with_prompt(prompt)
            .with_initial_text(initial)
            .allow_empty(true)
            .interact_text()
            .context("Input error")
    }

    fn proceed(&mut self, step: Step) -> Result<bool> {
        let choice = dialoguer::Select::new()
            .with_prompt(format!("Step {} of {}: {}", step.number(), Step::COUNT, step.title()))
            .items(&["Continue", "Back"])
            .default(0)
            .interact()
            .context("Input error")?;
        Ok(choice == 0)
    }

    fn retry(&mut self) -> Result<bool> {
        dialoguer::Confirm::new()
            .with_prompt("Submission failed. Try again?")
            .default(true)
            .interact()
            .context("Input error")
    }
}

/// For non-terminal stdin: every answer has to come from flags.
pub struct NoPrompt;

impl Prompter for NoPrompt {
    fn interactive(&self) -> bool {
        false
    }

    fn input(&mut self, prompt: &str, _initial: &str) -> Result<String> {
        Err(anyhow!("{} is required (pass it as a flag)", prompt))
    }

    fn proceed(&mut self, _step: Step) -> Result<bool> {
        Ok(true)
    }

    fn retry(&mut self) -> Result<bool> {
        Ok(false)
    }
}

/// Walks the workflow from its current step to a submitted application.
///
/// Flags are used once; after that, and for anything missing, the prompter
/// is asked. Without an interactive prompter the first rejected step or
/// failed submission ends the run.
pub async fn run_apply(
    workflow: &mut ApplicationWorkflow,
    store: &mut JobStore,
    clock: &dyn Clock,
    failures: &mut FailureInjector,
    mut input: ApplyInput,
    prompter: &mut dyn Prompter,
) -> Result<JobApplication> {
    loop {
        let WorkflowState::Editing(step) = workflow.state() else {
            return Err(BoardError::InvalidTransition("the application is no longer editable").into());
        };

        if step != Step::PersonalDetails
            && needs_prompt(step, &input)
            && !prompter.proceed(step)?
        {
            workflow.back()?;
            continue;
        }

        if !fill_step(workflow, step, &mut input, prompter)? {
            continue;
        }

        let outcome = if step == Step::CoverLetter {
            let form = workflow.form();
            println!(
                "Submitting application as {} <{}> ({}% complete)...",
                form.name.trim(),
                form.email.trim(),
                workflow.progress()
            );
            match workflow.submit(store, clock, failures).await {
                Ok(application) => return Ok(application),
                Err(BoardError::SubmissionFailed) => {
                    eprintln!("Failed to submit application. Please try again.");
                    if prompter.retry()? {
                        debug!(job_id = workflow.job_id(), "Retrying submission");
                        continue;
                    }
                    return Err(BoardError::SubmissionFailed.into());
                }
                Err(e) => Err(e),
            }
        } else {
            workflow.next().map(|_| ())
        };

        match outcome {
            Ok(()) => {}
            Err(BoardError::Validation(_)) => {
                report_errors(step, workflow.errors());
                if !prompter.interactive() {
                    return Err(BoardError::Validation(workflow.errors().clone()).into());
                }
            }
            Err(e) => return Err(e.into()),
        }
    }
}

fn needs_prompt(step: Step, input: &ApplyInput) -> bool {
    match step {
        Step::PersonalDetails => {
            input.name.is_none() || input.email.is_none() || input.phone.is_none()
        }
        Step::Resume => input.resume.is_none(),
        Step::CoverLetter => input.cover_letter.is_none(),
    }
}

/// Fills the fields of `step`. Returns false if the step should be shown
/// again (a rejected resume), with the problem already reported.
fn fill_step(
    workflow: &mut ApplicationWorkflow,
    step: Step,
    input: &mut ApplyInput,
    prompter: &mut dyn Prompter,
) -> Result<bool> {
    match step {
        Step::PersonalDetails => {
            let name = answer(&mut input.name, "Full name", &workflow.form().name, prompter)?;
            let email = answer(&mut input.email, "Email", &workflow.form().email, prompter)?;
            let phone = answer(&mut input.phone, "Phone number", &workflow.form().phone, prompter)?;
            let form = workflow.form_mut();
            form.name = name;
            form.email = email;
            form.phone = phone;
            Ok(true)
        }
        Step::Resume => {
            let path = match input.resume.take() {
                Some(path) => path,
                None => {
                    let current = workflow
                        .form()
                        .resume
                        .as_ref()
                        .map(|r| r.file_name.clone())
                        .unwrap_or_default();
                    PathBuf::from(prompter.input("Resume file (.pdf, .doc, .docx)", &current)?)
                }
            };
            let attachment = match ResumeAttachment::from_path(&path) {
                Ok(attachment) => attachment,
                Err(e) if prompter.interactive() => {
                    eprintln!("  resume: {e:#}");
                    return Ok(false);
                }
                Err(e) => return Err(e),
            };
            match workflow.attach_resume(attachment) {
                Ok(()) => Ok(true),
                Err(BoardError::Validation(errors)) => {
                    report_errors(step, &errors);
                    if prompter.interactive() {
                        Ok(false)
                    } else {
                        Err(BoardError::Validation(errors).into())
                    }
                }
                Err(e) => Err(e.into()),
            }
        }
        Step::CoverLetter => {
            let letter = answer(
                &mut input.cover_letter,
                "Cover letter (at least 100 characters)",
                &workflow.form().cover_letter,
                prompter,
            )?;
            workflow.form_mut().cover_letter = letter;
            Ok(true)
        }
    }
}

fn answer(
    given: &mut Option<String>,
    prompt: &str,
    current: &str,
    prompter: &mut dyn Prompter,
) -> Result<String> {
    match given.take() {
        Some(value) => Ok(value),
        None => prompter.input(prompt, current),
    }
}

fn report_errors(step: Step, errors: &FieldErrors) {
    eprintln!("Step {} of {} ({}) is incomplete:", step.number(), Step::COUNT, step.title());
    for (field, message) in errors.messages() {
        eprintln!("  {}: {}", field, message);
    }
}
