//! Validator for a new template order typed as menu numbers, e.g. `3 1 2`.

use anyhow::Result;

use crate::interaction::{InputValidator, InputValidatorResult};

/// Parse 1-based template numbers separated by spaces or commas into 0-based positions.
///
/// Numbers must be within `1..=count` and may appear only once. Templates that are
/// not mentioned keep their relative order after the mentioned ones.
pub fn parse_order(input: &str, count: usize) -> Result<Vec<usize>, String> {
    let mut positions = Vec::new();
    for token in input
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
    {
        let number: usize = token
            .parse()
            .map_err(|_| format!("'{token}' is not a template number"))?;
        if number == 0 || number > count {
            return Err(format!("Template numbers must be between 1 and {count}"));
        }
        if positions.contains(&(number - 1)) {
            return Err(format!("Template {number} is listed more than once"));
        }
        positions.push(number - 1);
    }
    Ok(positions)
}

#[derive(Clone)]
pub struct TemplateOrderValidator {
    count: usize,
}

impl TemplateOrderValidator {
    pub fn new(count: usize) -> Self {
        Self { count }
    }
}

impl InputValidator for TemplateOrderValidator {
    fn validate(&self, input: &str) -> Result<InputValidatorResult> {
        Ok(match parse_order(input, self.count) {
            Ok(_) => InputValidatorResult::Valid,
            Err(message) => InputValidatorResult::Invalid(message),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_order() {
        assert_eq!(parse_order("3 1", 3), Ok(vec![2, 0]));
        assert_eq!(parse_order("2, 3,1", 3), Ok(vec![1, 2, 0]));
        assert_eq!(parse_order("  ", 3), Ok(vec![]));

        assert_eq!(
            parse_order("4", 3),
            Err("Template numbers must be between 1 and 3".to_string())
        );
        assert_eq!(
            parse_order("1 1", 3),
            Err("Template 1 is listed more than once".to_string())
        );
        assert!(parse_order("first", 3).is_err());
    }

    #[test]
    fn test_template_order_validator() {
        let validator = TemplateOrderValidator::new(2);
        assert_eq!(validator.validate("2 1").unwrap(), InputValidatorResult::Valid);
        assert!(matches!(
            validator.validate("0").unwrap(),
            InputValidatorResult::Invalid(_)
        ));
    }
}
