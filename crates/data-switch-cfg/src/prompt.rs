//! Operator confirmation for destructive steps.

use async_trait::async_trait;
use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// Asks the operator before a destructive step.
#[async_trait]
pub trait Confirm: Send {
    /// Shows `message` and returns true only on an affirmative answer.
    ///
    /// A negative answer is not an error; end of input is.
    async fn confirm(&mut self, message: &str) -> io::Result<bool>;
}

/// Only "Y" and "yes" count as consent.
pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim(), "Y" | "yes")
}

/// Line-oriented prompt over an async reader and writer.
pub struct LinePrompt<R, W> {
    input: R,
    output: W,
}

/// Prompt on the process terminal.
pub type StdinConfirm = LinePrompt<BufReader<tokio::io::Stdin>, tokio::io::Stdout>;

impl StdinConfirm {
    pub fn stdin() -> Self {
        LinePrompt::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> LinePrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn into_output(self) -> W {
        self.output
    }
}

#[async_trait]
impl<R, W> Confirm for LinePrompt<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn confirm(&mut self, message: &str) -> io::Result<bool> {
        self.output
            .write_all(format!("\n\n{}\nEnter (Y/yes/n): ", message).as_bytes())
            .await?;
        self.output.flush().await?;

        let mut answer = String::new();
        if self.input.read_line(&mut answer).await? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "input closed at confirmation prompt",
            ));
        }
        Ok(is_affirmative(&answer))
    }
}
