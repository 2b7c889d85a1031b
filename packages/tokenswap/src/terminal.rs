//! Shared stdin reader and the interactive signing prompt
//!
//! The console loop and the wallet's consent prompt both read from stdin.
//! They share one line reader so a prompt raised while a command runs gets
//! the next line typed by the user.

use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use tokenswap_rs::{ConsentRequest, SigningPrompt};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;
use tracing::warn;

/// Line reader over the process stdin
pub struct TerminalInput {
    lines: Mutex<Lines<BufReader<Stdin>>>,
}

impl TerminalInput {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        })
    }

    /// Print `prompt` and read one line. `None` at end of input.
    pub async fn read_line(&self, prompt: &str) -> std::io::Result<Option<String>> {
        print!("{}", prompt);
        std::io::stdout().flush()?;
        self.lines.lock().await.next_line().await
    }
}

/// Asks on the terminal before the wallet acts
pub struct TerminalPrompt {
    input: Arc<TerminalInput>,
}

impl TerminalPrompt {
    pub fn new(input: Arc<TerminalInput>) -> Self {
        Self { input }
    }
}

#[async_trait]
impl SigningPrompt for TerminalPrompt {
    async fn confirm(&self, request: &ConsentRequest) -> bool {
        let question = format!("{} [y/N] ", request);
        match self.input.read_line(&question).await {
            Ok(Some(answer)) => is_yes(&answer),
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e, "Failed to read confirmation");
                false
            }
        }
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
