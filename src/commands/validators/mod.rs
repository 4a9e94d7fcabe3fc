//! Validators for input typed into the interactive menus.

pub mod console_width;
pub mod template_order;

pub use console_width::ConsoleWidthValidator;
pub use template_order::{TemplateOrderValidator, parse_order};
