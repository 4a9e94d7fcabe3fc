//! Core traits shared by every command.
//!
//! - [`Command`] is anything that can run.
//! - [`CommandWithOutput`] runs and produces a value to report.
//!
//! [`CommandWithOutputExt::with_print_to_stdout`] turns the latter into the former by
//! printing the value in the requested [`Format`] once the command finishes.

use anyhow::Result;
use async_trait::async_trait;

use crate::formatting::{Format, Formattable};

#[async_trait]
pub trait Command {
    async fn execute(&mut self) -> Result<()>;
}

#[async_trait]
pub trait CommandWithOutput {
    type Output;

    async fn execute(&mut self) -> Result<Self::Output>;
}

pub trait CommandWithOutputExt {
    /// Wrap the command so its output is printed to stdout in `format`.
    fn with_print_to_stdout(self, format: Format) -> Result<Box<dyn Command>>;
}

pub struct PrintToStdoutCommand<C> {
    command: C,
    format: Format,
}

#[async_trait]
impl<C, O> Command for PrintToStdoutCommand<C>
where
    C: CommandWithOutput<Output = O> + Send,
    O: Formattable,
{
    async fn execute(&mut self) -> Result<()> {
        let output = self.command.execute().await?;
        println!("{}", output.format(self.format)?);
        Ok(())
    }
}

impl<C, O> CommandWithOutputExt for C
where
    C: CommandWithOutput<Output = O> + Send + 'static,
    O: Formattable + 'static,
{
    fn with_print_to_stdout(self, format: Format) -> Result<Box<dyn Command>> {
        Ok(Box::new(PrintToStdoutCommand {
            command: self,
            format,
        }))
    }
}


#[cfg(test)]
mod tests {
    use std::fmt::{self, Display};

    use serde::Serialize;

    use super::*;

    #[derive(Serialize)]
    struct Count(usize);

    impl Display for Count {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{} templates", self.0)
        }
    }

    struct Counting {
        runs: usize,
    }

    #[async_trait]
    impl CommandWithOutput for Counting {
        type Output = Count;

        async fn execute(&mut self) -> Result<Count> {
            self.runs += 1;
            Ok(Count(self.runs))
        }
    }

    #[tokio::test]
    async fn test_print_to_stdout_runs_inner_command() {
        let mut command = Counting { runs: 0 }
            .with_print_to_stdout(Format::Json)
            .unwrap();
        command.execute().await.unwrap();
        command.execute().await.unwrap();
    }
}
