//! TokenSwap CLI
//!
//! Terminal front end for the TokenA/TokenB swap: connects a local key
//! wallet, aligns it with the target network and runs the approve-then-swap
//! sequence.
//!
//! ```text
//! tokenswap connect
//! tokenswap balances
//! tokenswap approve 10 --direction a-to-b
//! tokenswap swap 10 --direction b-to-a
//! tokenswap console
//! ```

mod config;
mod console;
mod terminal;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use eyre::{eyre, Result};
use tokenswap_rs::{
    AutoApprove, KnownNetwork, LocalWallet, SessionManager, SigningPrompt, SwapDirection,
    SwapOutcome, SwapWorkflow, WalletProvider,
};
use tracing::{error, info};

use config::Config;
use console::{render_session, render_swap, Console};
use terminal::{TerminalInput, TerminalPrompt};

#[derive(Parser)]
#[command(name = "tokenswap")]
#[command(about = "Connect a wallet and swap TokenA/TokenB", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Consent to every wallet prompt without asking
    #[arg(short, long, global = true)]
    yes: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect the wallet and show the session
    Connect,

    /// Show TokenA and TokenB balances
    Balances,

    /// Approve the spender for an amount of the input token
    Approve {
        /// Decimal amount, up to 18 fractional digits
        amount: String,

        /// a-to-b or b-to-a
        #[arg(short, long, default_value = "a-to-b")]
        direction: SwapDirection,
    },

    /// Approve and swap an amount in one run
    Swap {
        /// Decimal amount, up to 18 fractional digits
        amount: String,

        /// a-to-b or b-to-a
        #[arg(short, long, default_value = "a-to-b")]
        direction: SwapDirection,
    },

    /// Interactive swap console
    Console,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    init_logging(cli.verbose);

    let config = Config::load()?;
    info!(
        wallet_rpc = %config.wallet_rpc_url,
        wallet_chain = config.wallet_chain_id,
        target_chain = config.target.chain_id,
        token_a = %config.contracts.token_a,
        token_b = %config.contracts.token_b,
        swap = %config.contracts.swap,
        "Configuration loaded"
    );

    let input = TerminalInput::new();
    let prompt: Arc<dyn SigningPrompt> = if cli.yes {
        Arc::new(AutoApprove)
    } else {
        Arc::new(TerminalPrompt::new(input.clone()))
    };
    let workflow = build_workflow(&config, prompt)?;

    match cli.command {
        Commands::Connect => {
            let state = connect(&workflow).await?;
            println!("{}", render_session(&state));
            println!("{}", render_swap(&workflow.state()));
        }
        Commands::Balances => {
            connect(&workflow).await?;
            let balances = workflow.fetch_balances().await;
            println!("TokenA: {}", balances.token_a);
            println!("TokenB: {}", balances.token_b);
        }
        Commands::Approve { amount, direction } => {
            connect(&workflow).await?;
            set_direction(&workflow, direction);
            let receipt = workflow.approve(&amount).await?;
            println!("Approved {} ({}), tx {}", amount, direction, receipt.tx_hash);
        }
        Commands::Swap { amount, direction } => {
            connect(&workflow).await?;
            set_direction(&workflow, direction);
            workflow.set_amount(amount.clone());
            workflow.approve(&amount).await?;
            match workflow.swap(&amount).await? {
                SwapOutcome::Completed(receipt) => {
                    println!("Swapped {} ({}), tx {}", amount, direction, receipt.tx_hash);
                    println!("{}", render_swap(&workflow.state()));
                }
                SwapOutcome::Skipped => return Err(eyre!("Swap skipped: approval not recorded")),
            }
        }
        Commands::Console => {
            Console::new(workflow, input).run().await?;
        }
    }

    Ok(())
}

fn build_workflow(config: &Config, prompt: Arc<dyn SigningPrompt>) -> Result<Arc<SwapWorkflow>> {
    let home_name = if config.wallet_chain_id == config.target.chain_id {
        config.target.chain_name.clone()
    } else {
        format!("Chain {}", config.wallet_chain_id)
    };
    let home = KnownNetwork::new(config.wallet_chain_id, home_name, &config.wallet_rpc_url)?;
    let wallet = LocalWallet::from_private_key(&config.wallet_private_key, home, prompt)?;

    let provider: Arc<dyn WalletProvider> = Arc::new(wallet);
    let session = SessionManager::new(Some(provider), config.target.clone(), config.contracts)
        .with_confirmation(config.confirmation);
    Ok(Arc::new(SwapWorkflow::new(Arc::new(session), config.spender)))
}

/// Connect and load balances, or fail with the session notice
async fn connect(workflow: &SwapWorkflow) -> Result<tokenswap_rs::SessionState> {
    let state = workflow.session().connect().await;
    if !state.is_connected() {
        let reason = state.notice.as_deref().unwrap_or("unknown error");
        error!(reason, "Wallet not connected");
        return Err(eyre!("Wallet not connected: {}", reason));
    }
    workflow.sync_session(&state).await;
    Ok(state)
}

fn set_direction(workflow: &SwapWorkflow, direction: SwapDirection) {
    if workflow.state().direction != direction {
        workflow.toggle_direction();
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,tokenswap=debug,tokenswap_rs=debug"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

pub(crate) async fn wait_for_shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, closing");
        }
        _ = terminate => {
            info!("Received SIGTERM, closing");
        }
    }
}
