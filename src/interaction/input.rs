use anyhow::Result;
use inquire::{
    Confirm, InquireError, MultiSelect, Select, Text,
    error::CustomUserError,
    validator::{ErrorMessage, StringValidator, Validation},
};

use super::{
    ConfirmationPrompt, ConfirmationPromptOptions, ConfirmationPromptResult, InputPrompt,
    InputPromptOptions, InputPromptResult, InputPromptValidator, InputValidatorResult,
    Interaction, MultiSelectPrompt, MultiSelectPromptOptions, MultiSelectPromptResult,
    SelectPrompt, SelectPromptOptions, SelectPromptResult,
};

fn is_canceled(err: &InquireError) -> bool {
    matches!(
        err,
        InquireError::OperationCanceled | InquireError::OperationInterrupted
    )
}

impl ConfirmationPrompt for Interaction {
    fn confirm(&self, options: ConfirmationPromptOptions) -> Result<ConfirmationPromptResult> {
        let mut prompt = Confirm::new(&options.message);
        if let Some(default) = options.default {
            prompt = prompt.with_default(default);
        }

        if let Some(help_text) = &options.post_confirmation_help_text {
            prompt = prompt.with_help_message(help_text);
        }

        if let Some(help_text) = &options.pre_confirmation_help_text {
            println!("{help_text}");
        }

        match prompt.prompt() {
            Ok(true) => Ok(ConfirmationPromptResult::Yes),
            Ok(false) => Ok(ConfirmationPromptResult::No),
            Err(err) if is_canceled(&err) => Ok(ConfirmationPromptResult::Canceled),
            Err(err) => Err(anyhow::anyhow!("error prompting for confirmation: {err}")),
        }
    }
}

impl StringValidator for InputPromptValidator {
    fn validate(&self, input: &str) -> Result<Validation, CustomUserError> {
        match self.0.validate(input) {
            Ok(InputValidatorResult::Valid) => Ok(Validation::Valid),
            Ok(InputValidatorResult::Invalid(error)) => {
                Ok(Validation::Invalid(ErrorMessage::Custom(error)))
            }
            Err(e) => Err(CustomUserError::from(e)),
        }
    }
}

impl InputPrompt for Interaction {
    fn input(&self, options: InputPromptOptions) -> Result<InputPromptResult> {
        let mut prompt = Text::new(&options.message);

        if let Some(default) = options.default.as_deref() {
            prompt = prompt.with_default(default);
        }

        if let Some(help_message) = options.help_message.as_deref() {
            prompt = prompt.with_help_message(help_message);
        }

        if let Some(validator) = options.validator {
            prompt = prompt.with_validator(validator);
        }

        match prompt.prompt() {
            Ok(value) => Ok(InputPromptResult::Input(value)),
            Err(err) if is_canceled(&err) => Ok(InputPromptResult::Canceled),
            Err(err) => Err(anyhow::anyhow!("error prompting for input: {err}")),
        }
    }
}

impl SelectPrompt for Interaction {
    fn select(&self, options: SelectPromptOptions) -> Result<SelectPromptResult> {
        let select = Select::new(&options.message, options.options)
            .with_starting_cursor(options.starting_cursor);

        match select.prompt() {
            Ok(selected) => Ok(SelectPromptResult::Selected(selected)),
            Err(err) if is_canceled(&err) => Ok(SelectPromptResult::Canceled),
            Err(err) => Err(anyhow::anyhow!("error prompting for selection: {err}")),
        }
    }
}

impl MultiSelectPrompt for Interaction {
    fn multi_select(&self, options: MultiSelectPromptOptions) -> Result<MultiSelectPromptResult> {
        let select = MultiSelect::new(&options.message, options.options)
            .with_default(&options.checked);

        match select.raw_prompt() {
            Ok(selected) => Ok(MultiSelectPromptResult::Selected(
                selected.into_iter().map(|option| option.index).collect(),
            )),
            Err(err) if is_canceled(&err) => Ok(MultiSelectPromptResult::Canceled),
            Err(err) => Err(anyhow::anyhow!("error prompting for selection: {err}")),
        }
    }
}
