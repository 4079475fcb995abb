//! Connection lifecycle: an immutable state value, the events that move it,
//! and a pure transition function.

use serde::Serialize;
use solana_sdk::signature::Signature;
use std::cell::Cell;
use tokio::sync::watch;

use crate::config::NetworkConfig;
use crate::resolver::OwnedTokenAccount;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum BootstrapState {
    #[default]
    NeedsBootstrap,
    IsBootstrapping,
    Bootstrapped,
}

/// Coarse view combining the bootstrap state and the wallet flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ConnectionPhase {
    Disconnected,
    NeedsBootstrap,
    IsBootstrapping,
    Bootstrapped,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DepositOutcome {
    Confirmed(Signature),
    Failed(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LifecycleState {
    pub network: NetworkConfig,
    pub wallet_connected: bool,
    pub bootstrap_state: BootstrapState,
    /// Bootstrap has been asked for and not yet started.
    pub bootstrap_trigger: bool,
    /// The current session must be torn down before anything else runs.
    pub pending_shutdown: bool,
    pub owned_token_accounts: Vec<OwnedTokenAccount>,
    pub last_deposit: Option<DepositOutcome>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    WalletConnected,
    WalletDisconnected,
    /// Explicit (re)try request.
    BootstrapTriggered,
    BootstrapRequested,
    BootstrapSucceeded,
    BootstrapFailed,
    NetworkChanged { network: NetworkConfig },
    ShutdownRequested,
    OwnedTokenAccountsSet { accounts: Vec<OwnedTokenAccount> },
    DepositReported { outcome: DepositOutcome },
}

impl LifecycleState {
    pub fn initial(network: NetworkConfig) -> Self {
        LifecycleState {
            network,
            wallet_connected: false,
            bootstrap_state: BootstrapState::NeedsBootstrap,
            bootstrap_trigger: false,
            pending_shutdown: false,
            owned_token_accounts: Vec::new(),
            last_deposit: None,
        }
    }

    pub fn phase(&self) -> ConnectionPhase {
        match self.bootstrap_state {
            BootstrapState::IsBootstrapping => ConnectionPhase::IsBootstrapping,
            BootstrapState::Bootstrapped => ConnectionPhase::Bootstrapped,
            BootstrapState::NeedsBootstrap if self.wallet_connected => {
                ConnectionPhase::NeedsBootstrap
            }
            BootstrapState::NeedsBootstrap => ConnectionPhase::Disconnected,
        }
    }

    /// Whether a bootstrap cycle may start now.
    pub fn ready_to_bootstrap(&self) -> bool {
        self.bootstrap_trigger
            && self.wallet_connected
            && !self.pending_shutdown
            && self.bootstrap_state == BootstrapState::NeedsBootstrap
    }

    fn request_bootstrap(&mut self) {
        // A cycle in flight already covers the request.
        if self.bootstrap_state != BootstrapState::IsBootstrapping {
            self.bootstrap_state = BootstrapState::NeedsBootstrap;
            self.bootstrap_trigger = true;
        }
    }
}

impl Event {
    /// Events after which an in-flight cycle's result must be dropped.
    pub fn supersedes_cycle(&self, before: &LifecycleState) -> bool {
        match self {
            Event::ShutdownRequested | Event::WalletDisconnected => true,
            Event::NetworkChanged { network } => network.label != before.network.label,
            _ => false,
        }
    }
}

pub fn reduce(state: &LifecycleState, event: &Event) -> LifecycleState {
    let mut next = state.clone();
    match event {
        Event::WalletConnected => {
            next.wallet_connected = true;
            next.request_bootstrap();
        }
        Event::WalletDisconnected => {
            next.wallet_connected = false;
            next.pending_shutdown = true;
        }
        Event::BootstrapTriggered => next.request_bootstrap(),
        Event::BootstrapRequested => {
            if state.bootstrap_state == BootstrapState::NeedsBootstrap {
                next.bootstrap_state = BootstrapState::IsBootstrapping;
                next.bootstrap_trigger = false;
            }
        }
        Event::BootstrapSucceeded => {
            if state.bootstrap_state == BootstrapState::IsBootstrapping {
                next.bootstrap_state = BootstrapState::Bootstrapped;
            }
        }
        Event::BootstrapFailed => {
            if state.bootstrap_state == BootstrapState::IsBootstrapping {
                next.bootstrap_state = BootstrapState::NeedsBootstrap;
            }
        }
        Event::NetworkChanged { network } => {
            if network.label != state.network.label {
                next.network = network.clone();
                next.bootstrap_state = BootstrapState::NeedsBootstrap;
                next.pending_shutdown = true;
            }
        }
        // Everything except the network selection goes back to defaults.
        Event::ShutdownRequested => next = LifecycleState::initial(state.network.clone()),
        Event::OwnedTokenAccountsSet { accounts } => {
            next.owned_token_accounts = accounts.clone();
        }
        Event::DepositReported { outcome } => next.last_deposit = Some(outcome.clone()),
    }
    next
}

/// Holder of the current state snapshot.
///
/// Each dispatch replaces the snapshot wholesale and notifies subscribers.
/// `session` counts events that invalidate a bootstrap cycle in flight.
pub struct Store {
    state: watch::Sender<LifecycleState>,
    session: Cell<u64>,
}

impl Store {
    pub fn new(initial: LifecycleState) -> Self {
        let (state, _) = watch::channel(initial);
        Store {
            state,
            session: Cell::new(0),
        }
    }

    pub fn snapshot(&self) -> LifecycleState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    pub fn session(&self) -> u64 {
        self.session.get()
    }

    pub fn dispatch(&self, event: Event) {
        let current = self.snapshot();
        if event.supersedes_cycle(&current) {
            self.session.set(self.session.get() + 1);
        }
        log::debug!("dispatch {:?}", event);
        self.state.send_replace(reduce(&current, &event));
    }
}
