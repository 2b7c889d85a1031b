//! Interactive swap console
//!
//! A line-oriented rendition of the swap page: connect once on start, then
//! read commands until `quit`, end of input or Ctrl+C.

use std::str::FromStr;
use std::sync::Arc;

use eyre::Result;
use tokenswap_rs::{
    SessionManager, SessionState, SwapOutcome, SwapState, SwapWorkflow, TokenSide,
};
use tracing::{debug, info};

use crate::terminal::TerminalInput;

const HELP: &str = "\
Commands:
  connect          connect the wallet
  disconnect       forget the wallet connection
  network          switch the wallet to the target network
  balances         refresh TokenA / TokenB balances
  toggle           flip the swap direction (clears approval)
  amount <x>       set the amount to swap
  approve          approve the current amount
  swap             swap the approved amount
  status           show session and swap state
  help             show this help
  quit             leave the console";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Connect,
    Disconnect,
    Network,
    Balances,
    Toggle,
    Amount(String),
    Approve,
    Swap,
    Status,
    Help,
    Quit,
}

impl FromStr for ConsoleCommand {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        let command = parts.next().ok_or_else(String::new)?;
        let rest: Vec<&str> = parts.collect();

        let no_args = |cmd: ConsoleCommand| {
            if rest.is_empty() {
                Ok(cmd)
            } else {
                Err(format!("{} takes no arguments", command))
            }
        };

        match command.to_ascii_lowercase().as_str() {
            "connect" => no_args(ConsoleCommand::Connect),
            "disconnect" => no_args(ConsoleCommand::Disconnect),
            "network" => no_args(ConsoleCommand::Network),
            "balances" => no_args(ConsoleCommand::Balances),
            "toggle" => no_args(ConsoleCommand::Toggle),
            "approve" => no_args(ConsoleCommand::Approve),
            "swap" => no_args(ConsoleCommand::Swap),
            "status" => no_args(ConsoleCommand::Status),
            "help" | "?" => no_args(ConsoleCommand::Help),
            "quit" | "exit" => no_args(ConsoleCommand::Quit),
            "amount" => match rest.as_slice() {
                [amount] => Ok(ConsoleCommand::Amount(amount.to_string())),
                [] => Ok(ConsoleCommand::Amount(String::new())),
                _ => Err("usage: amount <x>".to_string()),
            },
            other => Err(format!("unknown command {:?}, try `help`", other)),
        }
    }
}

/// Session line as the page header shows it
pub fn render_session(session: &SessionState) -> String {
    let mut line = if session.is_connected() {
        format!(
            "Connected {} on chain {}",
            session.address_display(),
            session
                .chain_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "?".to_string())
        )
    } else if session.status.is_pending() {
        "Waiting for wallet...".to_string()
    } else {
        "Disconnected".to_string()
    };
    if let Some(balance) = &session.native_balance {
        line.push_str(&format!(" | native {}", balance));
    }
    if let Some(notice) = &session.notice {
        line.push_str(&format!("\n  ! {}", notice));
    }
    line
}

/// Swap panel
pub fn render_swap(swap: &SwapState) -> String {
    let input = swap.direction.input();
    let output = swap.direction.output();
    let balance = |side: TokenSide| {
        let value = swap.balances.get(side);
        let shown = if value.is_empty() { "-" } else { value };
        shown.to_string()
    };

    let mut lines = vec![
        format!(
            "{} -> {}   ({} balance {}, {} balance {})",
            input.label(),
            output.label(),
            input.label(),
            balance(input),
            output.label(),
            balance(output)
        ),
        format!(
            "amount: {}   approved: {}",
            if swap.amount.is_empty() { "-" } else { swap.amount.as_str() },
            if swap.is_approved() { "yes" } else { "no" }
        ),
    ];
    if let Some(pending) = swap.pending {
        lines.push(format!("pending: {:?}", pending));
    }
    if let Some(error) = &swap.last_error {
        lines.push(format!("last error: {}", error));
    }
    lines.join("\n")
}

pub struct Console {
    session: Arc<SessionManager>,
    workflow: Arc<SwapWorkflow>,
    input: Arc<TerminalInput>,
}

impl Console {
    pub fn new(workflow: Arc<SwapWorkflow>, input: Arc<TerminalInput>) -> Self {
        Self {
            session: workflow.session().clone(),
            workflow,
            input,
        }
    }

    pub async fn run(&self) -> Result<()> {
        let listener = self.workflow.spawn_session_listener();

        if let Some(state) = self.session.mount().await {
            println!("{}", render_session(&state));
        }
        println!("Type `help` for commands.");

        loop {
            let line = tokio::select! {
                line = self.input.read_line("tokenswap> ") => line?,
                _ = crate::wait_for_shutdown_signal() => None,
            };
            let Some(line) = line else {
                break;
            };
            if line.trim().is_empty() {
                continue;
            }

            match line.parse::<ConsoleCommand>() {
                Ok(ConsoleCommand::Quit) => break,
                Ok(command) => self.execute(command).await,
                Err(message) => println!("{}", message),
            }
        }

        listener.abort();
        info!("Console closed");
        Ok(())
    }

    async fn execute(&self, command: ConsoleCommand) {
        debug!(?command, "Console command");
        match command {
            ConsoleCommand::Connect => {
                let state = self.session.connect().await;
                println!("{}", render_session(&state));
            }
            ConsoleCommand::Disconnect => {
                let state = self.session.disconnect().await;
                println!("{}", render_session(&state));
            }
            ConsoleCommand::Network => match self.session.switch_network().await {
                Ok(outcome) => println!("Network: {:?}", outcome),
                Err(e) => println!("Network switch failed: {}", e),
            },
            ConsoleCommand::Balances => {
                self.workflow.fetch_balances().await;
                println!("{}", render_swap(&self.workflow.state()));
            }
            ConsoleCommand::Toggle => {
                let direction = self.workflow.toggle_direction();
                println!("Direction: {}", direction);
            }
            ConsoleCommand::Amount(amount) => {
                self.workflow.set_amount(amount);
                println!("{}", render_swap(&self.workflow.state()));
            }
            ConsoleCommand::Approve => {
                let amount = self.workflow.state().amount;
                match self.workflow.approve(&amount).await {
                    Ok(receipt) => println!("Approved {} (tx {})", amount, receipt.tx_hash),
                    Err(e) => println!("Approve failed: {}", e),
                }
            }
            ConsoleCommand::Swap => {
                let amount = self.workflow.state().amount;
                match self.workflow.swap(&amount).await {
                    Ok(SwapOutcome::Completed(receipt)) => {
                        println!("Swapped {} (tx {})", amount, receipt.tx_hash);
                        println!("{}", render_swap(&self.workflow.state()));
                    }
                    Ok(SwapOutcome::Skipped) => println!("Approve the amount first"),
                    Err(e) => println!("Swap failed: {}", e),
                }
            }
            ConsoleCommand::Status => {
                println!("{}", render_session(&self.session.state()));
                println!("{}", render_swap(&self.workflow.state()));
            }
            ConsoleCommand::Help => println!("{}", HELP),
            ConsoleCommand::Quit => {}
        }
    }
}
