use anyhow::{format_err, Result};
use log::info;
use solana_sdk::{
    hash::Hash,
    pubkey::Pubkey,
    signature::{Keypair, Signer},
    transaction::Transaction,
};
use std::cell::RefCell;
use tokio::sync::broadcast;

/// Connection notifications emitted by a wallet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WalletNotification {
    Connected(Pubkey),
    Disconnected,
}

/// Wallet provider seam.
///
/// `connect`/`disconnect` only emit a notification when the connection status
/// actually changes.
#[allow(async_fn_in_trait)]
pub trait Wallet {
    fn public_key(&self) -> Option<Pubkey>;

    async fn connect(&self) -> Result<()>;

    async fn disconnect(&self) -> Result<()>;

    fn subscribe(&self) -> broadcast::Receiver<WalletNotification>;
}

pub fn read_keypair_file(s: &str) -> Result<Keypair> {
    solana_sdk::signature::read_keypair_file(s)
        .map_err(|_| format_err!("failed to read keypair from {}", s))
}

/// Wallet backed by a keypair file on disk.
pub struct KeypairWallet {
    path: String,
    keypair: RefCell<Option<Keypair>>,
    notifications: broadcast::Sender<WalletNotification>,
}

impl KeypairWallet {
    pub fn new(path: impl Into<String>) -> Self {
        let (notifications, _) = broadcast::channel(16);
        KeypairWallet {
            path: path.into(),
            keypair: RefCell::new(None),
            notifications,
        }
    }

    /// Sign `transaction` as fee payer, together with any extra signers.
    pub fn sign_transaction(
        &self,
        transaction: &mut Transaction,
        extra_signers: &[&Keypair],
        recent_blockhash: Hash,
    ) -> Result<()> {
        let keypair = self.keypair.borrow();
        let payer = keypair
            .as_ref()
            .ok_or_else(|| format_err!("wallet is not connected"))?;
        let mut signers: Vec<&dyn Signer> = vec![payer];
        signers.extend(extra_signers.iter().map(|k| *k as &dyn Signer));
        transaction.try_sign(&signers, recent_blockhash)?;
        Ok(())
    }
}

impl Wallet for KeypairWallet {
    fn public_key(&self) -> Option<Pubkey> {
        self.keypair.borrow().as_ref().map(|k| k.pubkey())
    }

    async fn connect(&self) -> Result<()> {
        if self.keypair.borrow().is_some() {
            return Ok(());
        }
        let keypair = read_keypair_file(&self.path)?;
        let pubkey = keypair.pubkey();
        *self.keypair.borrow_mut() = Some(keypair);
        info!("wallet {} connected", pubkey);
        // No subscribers is not an error.
        let _ = self.notifications.send(WalletNotification::Connected(pubkey));
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        if self.keypair.borrow_mut().take().is_some() {
            info!("wallet disconnected");
            let _ = self.notifications.send(WalletNotification::Disconnected);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<WalletNotification> {
        self.notifications.subscribe()
    }
}
