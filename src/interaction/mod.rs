//! Prompts and progress output, behind small traits so commands can be tested
//! against [`mocks::MockInteraction`] instead of a terminal.
//!
//! [`Interaction`] is the real terminal: prompts are drawn with inquire (see
//! `input.rs`) and spinners with indicatif (see `spinner.rs`). Every prompt
//! reports Esc/Ctrl-C as a `Canceled` result rather than an error.

use std::sync::Arc;

use anyhow::Result;
use typed_builder::TypedBuilder;

mod input;
mod spinner;

pub use spinner::with_progress;

/// The operator's terminal.
#[derive(Debug, Default, Clone)]
pub struct Interaction;

impl Interaction {
    pub fn new() -> Self {
        Self
    }
}

/// A yes/no question.
///
/// `pre_confirmation_help_text` is printed above the question, e.g. the previous
/// deployment error; `post_confirmation_help_text` is shown as the prompt's hint.
#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder)]
pub struct ConfirmationPromptOptions {
    #[builder(setter(transform = |message: impl Into<String>| message.into()))]
    message: String,
    #[builder(default, setter(strip_option))]
    default: Option<bool>,
    #[builder(default, setter(strip_option, into))]
    pre_confirmation_help_text: Option<String>,
    #[builder(default, setter(strip_option, into))]
    post_confirmation_help_text: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationPromptResult {
    Yes,
    No,
    Canceled,
}

impl ConfirmationPromptResult {
    /// Cancelling counts as "no".
    pub fn is_yes(self) -> bool {
        self == Self::Yes
    }
}

pub trait ConfirmationPrompt {
    fn confirm(&self, options: ConfirmationPromptOptions) -> Result<ConfirmationPromptResult>;
}

/// Free text input, optionally pre-filled and checked by a validator while typing.
#[derive(TypedBuilder)]
pub struct InputPromptOptions {
    #[builder(setter(transform = |message: impl Into<String>| message.into()))]
    pub message: String,
    #[builder(default, setter(strip_option(fallback = default_opt), into))]
    pub default: Option<String>,
    #[builder(default, setter(strip_option))]
    pub help_message: Option<String>,
    #[builder(default, setter(strip_option))]
    pub validator: Option<InputPromptValidator>,
}

/// Checks typed input before the prompt accepts it.
pub trait InputValidator {
    fn validate(&self, input: &str) -> Result<InputValidatorResult>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputValidatorResult {
    Valid,
    /// Rejected, with the message shown under the prompt.
    Invalid(String),
}

/// A shareable [`InputValidator`]; inquire clones its validators.
#[derive(Clone)]
pub struct InputPromptValidator(Arc<dyn InputValidator + Send + Sync>);

impl InputPromptValidator {
    pub fn new(validator: impl InputValidator + Send + Sync + 'static) -> Self {
        Self(Arc::new(validator))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputPromptResult {
    Input(String),
    Canceled,
}

pub trait InputPrompt {
    fn input(&self, options: InputPromptOptions) -> Result<InputPromptResult>;
}

/// Pick one option; the answer is the chosen option's text.
#[derive(Debug, PartialEq, Eq, TypedBuilder)]
pub struct SelectPromptOptions {
    #[builder(setter(transform = |message: impl Into<String>| message.into()))]
    message: String,
    #[builder(setter(transform = |labels: impl IntoIterator<Item = impl Into<String>>| {
        labels.into_iter().map(Into::into).collect()
    }))]
    options: Vec<String>,
    /// Index of the option highlighted when the prompt opens.
    #[builder(default)]
    starting_cursor: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectPromptResult {
    Selected(String),
    Canceled,
}

pub trait SelectPrompt {
    fn select(&self, options: SelectPromptOptions) -> Result<SelectPromptResult>;
}

/// Check any number of options, e.g. which templates are enabled.
#[derive(Debug, PartialEq, Eq, TypedBuilder)]
pub struct MultiSelectPromptOptions {
    #[builder(setter(transform = |message: impl Into<String>| message.into()))]
    message: String,
    #[builder(setter(transform = |labels: impl IntoIterator<Item = impl Into<String>>| {
        labels.into_iter().map(Into::into).collect()
    }))]
    options: Vec<String>,
    /// Indexes of the options that start out checked.
    #[builder(default)]
    checked: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MultiSelectPromptResult {
    /// Indexes of the checked options, in option order.
    Selected(Vec<usize>),
    Canceled,
}

pub trait MultiSelectPrompt {
    fn multi_select(&self, options: MultiSelectPromptOptions) -> Result<MultiSelectPromptResult>;
}

/// Keeps a spinner running; dropping it stops and clears the spinner.
pub struct SpinnerHandle {
    stop: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl SpinnerHandle {
    pub fn new(stop: Box<dyn FnOnce() + Send + Sync>) -> Self {
        Self { stop: Some(stop) }
    }
}

impl Drop for SpinnerHandle {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            stop();
        }
    }
}

pub trait SpinnerInteraction {
    fn start_spinner(&self, message: String) -> Result<SpinnerHandle>;
}
