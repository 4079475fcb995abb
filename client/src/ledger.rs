use solana_sdk::{account::Account, instruction::Instruction, pubkey::Pubkey, signature::Signature};
use std::rc::Rc;

use crate::error::IdoResult;

/// Remote ledger operations needed by a bootstrap cycle.
///
/// Implementations are bound to one wallet and one network for their whole
/// lifetime; the wallet pays for and signs every mutation.
#[allow(async_fn_in_trait)]
pub trait Ledger {
    /// Batched read. The result has one entry per requested address, `None`
    /// where the account does not exist.
    async fn get_multiple_accounts(&self, addresses: &[Pubkey]) -> IdoResult<Vec<Option<Account>>>;

    /// Raw token-program accounts whose owner field is `owner`.
    async fn get_owned_token_accounts(&self, owner: &Pubkey) -> IdoResult<Vec<(Pubkey, Account)>>;

    /// Create and initialise a fresh token account for `mint` owned by `owner`,
    /// returning its address once confirmed.
    async fn create_token_account(&self, mint: &Pubkey, owner: &Pubkey) -> IdoResult<Pubkey>;

    /// Sign with the wallet, send and confirm.
    async fn send_instructions(&self, instructions: &[Instruction]) -> IdoResult<Signature>;
}

impl<L: Ledger> Ledger for Rc<L> {
    async fn get_multiple_accounts(&self, addresses: &[Pubkey]) -> IdoResult<Vec<Option<Account>>> {
        (**self).get_multiple_accounts(addresses).await
    }

    async fn get_owned_token_accounts(&self, owner: &Pubkey) -> IdoResult<Vec<(Pubkey, Account)>> {
        (**self).get_owned_token_accounts(owner).await
    }

    async fn create_token_account(&self, mint: &Pubkey, owner: &Pubkey) -> IdoResult<Pubkey> {
        (**self).create_token_account(mint, owner).await
    }

    async fn send_instructions(&self, instructions: &[Instruction]) -> IdoResult<Signature> {
        (**self).send_instructions(instructions).await
    }
}
