#![allow(dead_code)]
use anyhow::{format_err, Result};
use clap::Parser;
use serde::Serialize;
use solana_sdk::{pubkey::Pubkey, signature::Signer};
use std::rc::Rc;
use tokio::io::{AsyncBufReadExt, BufReader};

mod config;
mod error;
mod ido_pool;
mod instructions;
mod ledger;
mod notify;
mod orchestrator;
mod resolver;
mod state;
mod submitter;
mod wallet;

use config::{load_cfg, ClientConfig, NetworkConfig};
use instructions::rpc::RpcLedger;
use notify::ConsoleNotifier;
use orchestrator::Orchestrator;
use resolver::{AccountResolver, OwnedTokenAccount};
use state::{BootstrapState, ConnectionPhase, DepositOutcome, LifecycleState, Store};
use wallet::{read_keypair_file, KeypairWallet, Wallet};

#[derive(Debug, Parser)]
pub struct Opts {
    /// Path of the INI configuration file.
    #[arg(long, default_value = "client_config.ini")]
    pub config: String,
    /// Network key overriding `[Global] network`.
    #[arg(long)]
    pub network: Option<String>,
    #[clap(subcommand)]
    pub command: IdoCommands,
}

#[derive(Debug, Parser)]
pub enum IdoCommands {
    /// Connect the wallet, run one bootstrap cycle and disconnect.
    Bootstrap {},
    /// Interactive session: connect, disconnect, network <key>, retry, status, quit.
    Shell {},
    /// Print the decoded pool account.
    PoolInfo {},
    /// Print the pool's derived signer.
    PoolSigner {},
}

#[derive(Serialize)]
struct StatusView<'a> {
    network: &'a str,
    phase: ConnectionPhase,
    bootstrap_state: BootstrapState,
    wallet: Option<String>,
    pending_shutdown: bool,
    owned_token_accounts: &'a [OwnedTokenAccount],
    last_deposit: Option<String>,
}

fn print_status(state: &LifecycleState, wallet: Option<Pubkey>) -> Result<()> {
    let view = StatusView {
        network: &state.network.label,
        phase: state.phase(),
        bootstrap_state: state.bootstrap_state,
        wallet: wallet.map(|w| w.to_string()),
        pending_shutdown: state.pending_shutdown,
        owned_token_accounts: &state.owned_token_accounts,
        last_deposit: state.last_deposit.as_ref().map(|outcome| match outcome {
            DepositOutcome::Confirmed(signature) => state.network.explorer_tx_url(&signature.to_string()),
            DepositOutcome::Failed(reason) => format!("failed: {}", reason),
        }),
    };
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}

fn build_orchestrator(
    client_config: &ClientConfig,
    network: NetworkConfig,
) -> Result<
    Orchestrator<
        KeypairWallet,
        RpcLedger,
        impl Fn(&NetworkConfig) -> Result<(Rc<KeypairWallet>, RpcLedger)>,
        ConsoleNotifier,
    >,
> {
    let payer_path = client_config.payer_path.clone();
    let commitment = client_config.commitment;
    let factory = move |network: &NetworkConfig| -> Result<(Rc<KeypairWallet>, RpcLedger)> {
        let wallet = Rc::new(KeypairWallet::new(payer_path.clone()));
        let ledger = RpcLedger::new(network, wallet.clone(), commitment);
        Ok((wallet, ledger))
    };
    let store = Rc::new(Store::new(LifecycleState::initial(network)));
    Orchestrator::new(
        store,
        factory,
        ConsoleNotifier,
        client_config.deposit_amount,
        client_config.submission_mode,
    )
}

async fn run_shell(client_config: &ClientConfig, network: NetworkConfig) -> Result<()> {
    let mut orchestrator = build_orchestrator(client_config, network)?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let mut words = line.split_whitespace();
        let result = match (words.next(), words.next()) {
            (None, _) => continue,
            (Some("connect"), _) => orchestrator.connect_wallet().await,
            (Some("disconnect"), _) => orchestrator.disconnect_wallet().await,
            (Some("network"), Some(key)) => match client_config.network_config(key) {
                Ok(network) => orchestrator.select_network(network).await,
                Err(err) => Err(err),
            },
            (Some("retry"), _) => orchestrator.retry().await,
            (Some("status"), _) => print_status(
                &orchestrator.store().snapshot(),
                orchestrator.wallet().public_key(),
            ),
            (Some("quit"), _) | (Some("exit"), _) => break,
            (Some(other), _) => Err(format_err!(
                "unknown command {} (connect, disconnect, network <key>, retry, status, quit)",
                other
            )),
        };
        if let Err(err) = result {
            eprintln!("{:#}", err);
        }
    }
    orchestrator.disconnect_wallet().await
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let opts = Opts::parse();
    let mut client_config = load_cfg(&opts.config)?;
    if let Some(network) = opts.network {
        client_config.network_config(&network)?;
        client_config.network = network;
    }
    let network = client_config.selected_network()?;

    match opts.command {
        IdoCommands::Bootstrap {} => {
            let mut orchestrator = build_orchestrator(&client_config, network)?;
            orchestrator.connect_wallet().await?;
            let state = orchestrator.store().snapshot();
            print_status(&state, orchestrator.wallet().public_key())?;
            orchestrator.disconnect_wallet().await?;
            if state.bootstrap_state != BootstrapState::Bootstrapped {
                return Err(format_err!("bootstrap on {} did not complete", state.network.label));
            }
        }
        IdoCommands::Shell {} => {
            run_shell(&client_config, network).await?;
        }
        IdoCommands::PoolInfo {} => {
            let payer = read_keypair_file(&client_config.payer_path)?;
            let wallet = Rc::new(KeypairWallet::new(client_config.payer_path.clone()));
            let ledger = RpcLedger::new(&network, wallet, client_config.commitment);
            let resolver = AccountResolver::new(
                &ledger,
                &network,
                payer.pubkey(),
                client_config.deposit_amount,
            );
            let pool = resolver.fetch_pool().await?;
            println!("{:#?}", pool.pool);
        }
        IdoCommands::PoolSigner {} => {
            let payer = read_keypair_file(&client_config.payer_path)?;
            let wallet = Rc::new(KeypairWallet::new(client_config.payer_path.clone()));
            let ledger = RpcLedger::new(&network, wallet, client_config.commitment);
            let resolver = AccountResolver::new(
                &ledger,
                &network,
                payer.pubkey(),
                client_config.deposit_amount,
            );
            let pool = resolver.fetch_pool().await?;
            let signer = resolver.derive_signer(resolver.fetch_mints(pool).await?);
            println!("{} {}", signer.signer.address, signer.signer.nonce);
        }
    }
    Ok(())
}
