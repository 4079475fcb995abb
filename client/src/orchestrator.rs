use anyhow::Result;
use log::{error, info, warn};
use std::rc::Rc;
use tokio::sync::broadcast::{self, error::TryRecvError};

use crate::config::NetworkConfig;
use crate::error::{IdoError, IdoResult};
use crate::ledger::Ledger;
use crate::notify::{Notifier, Variant};
use crate::resolver::{AccountResolver, OwnedTokenAccount, ResolvedDepositContext};
use crate::state::{DepositOutcome, Event, Store};
use crate::submitter::{DepositSubmitter, SubmissionMode};
use crate::wallet::{Wallet, WalletNotification};

/// Wallet and ledger handles built for one network.
struct Session<W: Wallet, L: Ledger> {
    network: NetworkConfig,
    wallet: Rc<W>,
    ledger: L,
    notifications: broadcast::Receiver<WalletNotification>,
}

struct CycleReport {
    context: ResolvedDepositContext,
    owned_token_accounts: Vec<OwnedTokenAccount>,
    deposit: DepositOutcome,
}

/// Drives bootstrap cycles and shutdowns from lifecycle state.
///
/// `F` builds the wallet and ledger for a network; it is called again
/// whenever the selected network moves away from the current session's.
pub struct Orchestrator<W, L, F, N>
where
    W: Wallet,
    L: Ledger,
    F: Fn(&NetworkConfig) -> Result<(Rc<W>, L)>,
    N: Notifier,
{
    store: Rc<Store>,
    factory: F,
    session: Session<W, L>,
    notifier: N,
    deposit_amount: u64,
    submission_mode: SubmissionMode,
}

impl<W, L, F, N> Orchestrator<W, L, F, N>
where
    W: Wallet,
    L: Ledger,
    F: Fn(&NetworkConfig) -> Result<(Rc<W>, L)>,
    N: Notifier,
{
    pub fn new(
        store: Rc<Store>,
        factory: F,
        notifier: N,
        deposit_amount: u64,
        submission_mode: SubmissionMode,
    ) -> Result<Self> {
        let session = Self::open_session(&factory, &store.snapshot().network)?;
        Ok(Orchestrator {
            store,
            factory,
            session,
            notifier,
            deposit_amount,
            submission_mode,
        })
    }

    fn open_session(factory: &F, network: &NetworkConfig) -> Result<Session<W, L>> {
        let (wallet, ledger) = factory(network)?;
        let notifications = wallet.subscribe();
        info!("session opened on {}", network.label);
        Ok(Session {
            network: network.clone(),
            wallet,
            ledger,
            notifications,
        })
    }

    pub fn store(&self) -> &Rc<Store> {
        &self.store
    }

    pub fn wallet(&self) -> &W {
        &self.session.wallet
    }

    pub async fn connect_wallet(&mut self) -> Result<()> {
        self.process().await?;
        self.session.wallet.connect().await?;
        self.process().await
    }

    pub async fn disconnect_wallet(&mut self) -> Result<()> {
        self.session.wallet.disconnect().await?;
        self.process().await
    }

    pub async fn select_network(&mut self, network: NetworkConfig) -> Result<()> {
        self.store.dispatch(Event::NetworkChanged { network });
        self.process().await
    }

    pub async fn retry(&mut self) -> Result<()> {
        self.store.dispatch(Event::BootstrapTriggered);
        self.process().await
    }

    /// React to wallet notifications and state until nothing is left to do.
    pub async fn process(&mut self) -> Result<()> {
        loop {
            self.pump_wallet_notifications();
            let state = self.store.snapshot();
            if state.pending_shutdown {
                self.shutdown().await;
                continue;
            }
            if self.session.network != state.network {
                self.session = Self::open_session(&self.factory, &state.network)?;
                continue;
            }
            if state.ready_to_bootstrap() {
                self.bootstrap().await;
                continue;
            }
            if self.session.notifications.is_empty() {
                return Ok(());
            }
        }
    }

    fn pump_wallet_notifications(&mut self) {
        loop {
            match self.session.notifications.try_recv() {
                Ok(WalletNotification::Connected(pubkey)) => {
                    info!("wallet {} connected", pubkey);
                    self.store.dispatch(Event::WalletConnected);
                }
                Ok(WalletNotification::Disconnected) => {
                    self.notifier
                        .notify(Variant::Info, "Disconnected from wallet");
                    self.store.dispatch(Event::WalletDisconnected);
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!("missed {} wallet notifications", skipped);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return,
            }
        }
    }

    async fn shutdown(&mut self) {
        if let Err(err) = self.session.wallet.disconnect().await {
            error!("wallet disconnect failed: {:?}", err);
            self.notifier.notify(
                Variant::Error,
                &format!("Error shutting down application: {}", err),
            );
        }
        self.store.dispatch(Event::ShutdownRequested);
    }

    async fn bootstrap(&mut self) {
        let network = self.store.snapshot().network;
        self.notifier
            .notify(Variant::Info, &format!("Connecting to {}", network.label));
        self.store.dispatch(Event::BootstrapRequested);
        let cycle = self.store.session();

        let result = self.run_cycle(&network, cycle).await;
        if self.store.session() != cycle {
            warn!("bootstrap on {} superseded, discarding result", network.label);
            return;
        }

        match result {
            Ok(report) => {
                info!("resolved deposit context {:?}", report.context);
                self.store.dispatch(Event::OwnedTokenAccountsSet {
                    accounts: report.owned_token_accounts,
                });
                match &report.deposit {
                    DepositOutcome::Confirmed(signature) => self.notifier.notify(
                        Variant::Success,
                        &format!(
                            "Deposit confirmed: {}",
                            network.explorer_tx_url(&signature.to_string())
                        ),
                    ),
                    DepositOutcome::Failed(reason) => self
                        .notifier
                        .notify(Variant::Warning, &format!("Deposit failed: {}", reason)),
                }
                self.store.dispatch(Event::DepositReported {
                    outcome: report.deposit,
                });
                self.store.dispatch(Event::BootstrapSucceeded);
                self.notifier
                    .notify(Variant::Success, "Connection established");
            }
            Err(err) => {
                error!("bootstrap on {} failed: {}", network.label, err);
                if let IdoError::SubmissionError(reason) = &err {
                    self.store.dispatch(Event::DepositReported {
                        outcome: DepositOutcome::Failed(reason.clone()),
                    });
                }
                self.store.dispatch(Event::BootstrapFailed);
                self.notifier.notify(
                    Variant::Error,
                    &format!("Error bootstrapping application: {}", err),
                );
            }
        }
    }

    /// Resolve then submit. Submission is skipped if the cycle was
    /// superseded while resolving.
    async fn run_cycle(&self, network: &NetworkConfig, cycle: u64) -> IdoResult<CycleReport> {
        let wallet = self
            .session
            .wallet
            .public_key()
            .ok_or(IdoError::WalletNotConnected)?;
        let resolver =
            AccountResolver::new(&self.session.ledger, network, wallet, self.deposit_amount);
        let resolution = resolver.resolve().await?;

        let deposit = if self.store.session() == cycle {
            DepositSubmitter::new(&self.session.ledger, network.ido_program, self.submission_mode)
                .submit(&resolution.context)
                .await?
        } else {
            DepositOutcome::Failed("bootstrap superseded before submission".to_string())
        };
        Ok(CycleReport {
            context: resolution.context,
            owned_token_accounts: resolution.owned_token_accounts,
            deposit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::networks;
    use crate::ledger::mock::{Call, MockLedger};
    use crate::notify::recording::RecordingNotifier;
    use crate::resolver::fixtures::{fixture, Fixture};
    use crate::state::{BootstrapState, ConnectionPhase, LifecycleState};
    use crate::wallet::mock::MockWallet;
    use std::cell::Cell;

    impl Notifier for Rc<RecordingNotifier> {
        fn notify(&self, variant: Variant, message: &str) {
            (**self).notify(variant, message)
        }
    }

    struct Harness {
        network: NetworkConfig,
        pool: crate::ido_pool::PoolAccount,
        wallet: Rc<MockWallet>,
        ledger: Rc<MockLedger>,
        notifier: Rc<RecordingNotifier>,
        sessions: Rc<Cell<usize>>,
        store: Rc<Store>,
    }

    fn harness() -> Harness {
        let Fixture {
            network,
            pool,
            wallet,
            ledger,
        } = fixture();
        let store = Rc::new(Store::new(LifecycleState::initial(network.clone())));
        Harness {
            network,
            pool,
            wallet: Rc::new(MockWallet::new(wallet)),
            ledger: Rc::new(ledger),
            notifier: Rc::new(RecordingNotifier::default()),
            sessions: Rc::new(Cell::new(0)),
            store,
        }
    }

    fn orchestrator(
        h: &Harness,
        mode: SubmissionMode,
    ) -> Orchestrator<
        MockWallet,
        Rc<MockLedger>,
        impl Fn(&NetworkConfig) -> Result<(Rc<MockWallet>, Rc<MockLedger>)>,
        Rc<RecordingNotifier>,
    > {
        let wallet = h.wallet.clone();
        let ledger = h.ledger.clone();
        let sessions = h.sessions.clone();
        let factory = move |_: &NetworkConfig| -> Result<(Rc<MockWallet>, Rc<MockLedger>)> {
            sessions.set(sessions.get() + 1);
            Ok((wallet.clone(), ledger.clone()))
        };
        Orchestrator::new(h.store.clone(), factory, h.notifier.clone(), 10_000_349, mode).unwrap()
    }

    #[tokio::test]
    async fn connect_runs_a_full_cycle() {
        let h = harness();
        let mut o = orchestrator(&h, SubmissionMode::BestEffort);
        o.connect_wallet().await.unwrap();

        let state = h.store.snapshot();
        assert_eq!(state.phase(), ConnectionPhase::Bootstrapped);
        assert!(state.wallet_connected);
        assert!(matches!(state.last_deposit, Some(DepositOutcome::Confirmed(_))));
        assert_eq!(state.owned_token_accounts.len(), 2);
        assert_eq!(
            h.ledger.created(),
            vec![h.network.usdc_mint, h.pool.redeemable_mint]
        );
        assert_eq!(h.ledger.sent.borrow().len(), 1);
        assert_eq!(
            h.notifier.variants(),
            vec![Variant::Info, Variant::Success, Variant::Success]
        );
    }

    #[tokio::test]
    async fn missing_mint_leaves_client_retryable() {
        let h = harness();
        h.ledger
            .accounts
            .borrow_mut()
            .remove(&h.pool.watermelon_mint);
        let mut o = orchestrator(&h, SubmissionMode::BestEffort);
        o.connect_wallet().await.unwrap();

        let state = h.store.snapshot();
        assert_eq!(state.bootstrap_state, BootstrapState::NeedsBootstrap);
        assert_eq!(state.phase(), ConnectionPhase::NeedsBootstrap);
        assert!(h.ledger.created().is_empty());
        assert!(h.ledger.sent.borrow().is_empty());
        assert_eq!(h.notifier.variants(), vec![Variant::Info, Variant::Error]);

        // Once the mint shows up a retry goes through.
        h.ledger.insert(
            h.pool.watermelon_mint,
            crate::ledger::mock::mint_account(6, 1),
        );
        o.retry().await.unwrap();
        assert_eq!(h.store.snapshot().phase(), ConnectionPhase::Bootstrapped);
    }

    #[tokio::test]
    async fn best_effort_deposit_failure_still_bootstraps() {
        let h = harness();
        h.ledger.fail_send.set(true);
        let mut o = orchestrator(&h, SubmissionMode::BestEffort);
        o.connect_wallet().await.unwrap();

        let state = h.store.snapshot();
        assert_eq!(state.phase(), ConnectionPhase::Bootstrapped);
        assert!(matches!(state.last_deposit, Some(DepositOutcome::Failed(_))));
        assert!(h.notifier.variants().contains(&Variant::Warning));
    }

    #[tokio::test]
    async fn strict_deposit_failure_fails_the_cycle() {
        let h = harness();
        h.ledger.fail_send.set(true);
        let mut o = orchestrator(&h, SubmissionMode::Strict);
        o.connect_wallet().await.unwrap();

        let state = h.store.snapshot();
        assert_eq!(state.bootstrap_state, BootstrapState::NeedsBootstrap);
        assert!(matches!(state.last_deposit, Some(DepositOutcome::Failed(_))));
    }

    #[tokio::test]
    async fn network_switch_tears_down_and_rebuilds_session() {
        let h = harness();
        let mut o = orchestrator(&h, SubmissionMode::BestEffort);
        o.connect_wallet().await.unwrap();
        assert_eq!(h.sessions.get(), 1);

        let mainnet = networks()["mainnet"].clone();
        o.select_network(mainnet.clone()).await.unwrap();

        let state = h.store.snapshot();
        assert_eq!(state, LifecycleState::initial(mainnet));
        assert_eq!(h.wallet.public_key(), None);
        assert!(h.wallet.disconnect_calls.get() >= 1);
        assert_eq!(h.sessions.get(), 2);
    }

    #[tokio::test]
    async fn wallet_disconnect_resets_state() {
        let h = harness();
        let mut o = orchestrator(&h, SubmissionMode::BestEffort);
        o.connect_wallet().await.unwrap();
        o.disconnect_wallet().await.unwrap();

        assert_eq!(
            h.store.snapshot(),
            LifecycleState::initial(h.network.clone())
        );
        assert!(h.notifier.variants().contains(&Variant::Info));
    }

    #[tokio::test]
    async fn shutdown_during_resolution_discards_the_result() {
        let h = harness();
        let store = h.store.clone();
        let fired = Cell::new(false);
        *h.ledger.on_read.borrow_mut() = Some(Box::new(move || {
            if !fired.replace(true) {
                store.dispatch(Event::ShutdownRequested);
            }
        }));
        let mut o = orchestrator(&h, SubmissionMode::BestEffort);
        o.connect_wallet().await.unwrap();

        let state = h.store.snapshot();
        assert_eq!(state.bootstrap_state, BootstrapState::NeedsBootstrap);
        assert!(state.owned_token_accounts.is_empty());
        assert_eq!(state.last_deposit, None);
        // The deposit is never sent for a torn-down session.
        assert!(!h
            .ledger
            .calls
            .borrow()
            .iter()
            .any(|call| matches!(call, Call::SendInstructions(_))));
        assert!(!h.notifier.variants().contains(&Variant::Success));
    }
}
