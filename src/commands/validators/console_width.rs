//! Validator for the console width setting.

use anyhow::Result;

use crate::{
    interaction::{InputValidator, InputValidatorResult},
    settings::{MAX_CONSOLE_WIDTH, MIN_CONSOLE_WIDTH},
};

/// Accepts an empty answer (keep the current width) or a width within the allowed range.
#[derive(Clone)]
pub struct ConsoleWidthValidator;

impl InputValidator for ConsoleWidthValidator {
    fn validate(&self, input: &str) -> Result<InputValidatorResult> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(InputValidatorResult::Valid);
        }

        Ok(match input.parse::<u16>() {
            Ok(width) if width < MIN_CONSOLE_WIDTH => InputValidatorResult::Invalid(format!(
                "Console width must be at least {MIN_CONSOLE_WIDTH} characters"
            )),
            Ok(width) if width > MAX_CONSOLE_WIDTH => InputValidatorResult::Invalid(format!(
                "Console width cannot exceed {MAX_CONSOLE_WIDTH} characters"
            )),
            Ok(_) => InputValidatorResult::Valid,
            Err(_) => InputValidatorResult::Invalid("Please enter a valid number".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_width_validator() {
        let validator = ConsoleWidthValidator;

        for valid in ["", "50", " 100 ", "200"] {
            assert_eq!(
                validator.validate(valid).unwrap(),
                InputValidatorResult::Valid,
                "{valid:?} should be valid"
            );
        }

        assert_eq!(
            validator.validate("49").unwrap(),
            InputValidatorResult::Invalid("Console width must be at least 50 characters".to_string())
        );
        assert_eq!(
            validator.validate("201").unwrap(),
            InputValidatorResult::Invalid("Console width cannot exceed 200 characters".to_string())
        );
        assert!(matches!(
            validator.validate("wide").unwrap(),
            InputValidatorResult::Invalid(_)
        ));
    }
}
