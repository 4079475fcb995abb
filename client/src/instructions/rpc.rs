use log::{debug, info};
use solana_account_decoder::UiAccountEncoding;
use solana_client::{
    client_error::Result as ClientResult,
    nonblocking::rpc_client::RpcClient,
    rpc_config::{RpcAccountInfoConfig, RpcProgramAccountsConfig},
    rpc_filter::{Memcmp, RpcFilterType},
};
use solana_sdk::{
    account::Account,
    commitment_config::CommitmentConfig,
    instruction::Instruction,
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    transaction::Transaction,
};
use spl_token::solana_program::program_pack::Pack;
use std::rc::Rc;

use super::ido_instructions::create_token_account_instr;
use crate::config::NetworkConfig;
use crate::error::{IdoError, IdoResult};
use crate::ledger::Ledger;
use crate::wallet::{KeypairWallet, Wallet};

/// Offset of the owner field in a token account.
const TOKEN_ACCOUNT_OWNER_OFFSET: usize = 32;

pub async fn send_txn(
    client: &RpcClient,
    txn: &Transaction,
    wait_confirm: bool,
) -> ClientResult<Signature> {
    if wait_confirm {
        client.send_and_confirm_transaction(txn).await
    } else {
        client.send_transaction(txn).await
    }
}

/// Ledger transport over JSON-RPC, bound to one network and one wallet.
pub struct RpcLedger {
    rpc_client: RpcClient,
    wallet: Rc<KeypairWallet>,
    commitment: CommitmentConfig,
}

impl RpcLedger {
    pub fn new(network: &NetworkConfig, wallet: Rc<KeypairWallet>, commitment: CommitmentConfig) -> Self {
        RpcLedger {
            rpc_client: RpcClient::new_with_commitment(network.http_url.clone(), commitment),
            wallet,
            commitment,
        }
    }

    fn payer(&self) -> IdoResult<Pubkey> {
        self.wallet.public_key().ok_or(IdoError::WalletNotConnected)
    }

    async fn sign_and_send(
        &self,
        instructions: &[Instruction],
        extra_signers: &[&Keypair],
    ) -> anyhow::Result<Signature> {
        let payer = self.payer()?;
        let mut txn = Transaction::new_with_payer(instructions, Some(&payer));
        let recent_hash = self.rpc_client.get_latest_blockhash().await?;
        self.wallet
            .sign_transaction(&mut txn, extra_signers, recent_hash)?;
        Ok(send_txn(&self.rpc_client, &txn, true).await?)
    }
}

impl Ledger for RpcLedger {
    async fn get_multiple_accounts(&self, addresses: &[Pubkey]) -> IdoResult<Vec<Option<Account>>> {
        debug!("get_multiple_accounts {:?}", addresses);
        Ok(self.rpc_client.get_multiple_accounts(addresses).await?)
    }

    async fn get_owned_token_accounts(&self, owner: &Pubkey) -> IdoResult<Vec<(Pubkey, Account)>> {
        let config = RpcProgramAccountsConfig {
            filters: Some(vec![
                RpcFilterType::DataSize(spl_token::state::Account::LEN as u64),
                RpcFilterType::Memcmp(Memcmp::new_base58_encoded(
                    TOKEN_ACCOUNT_OWNER_OFFSET,
                    owner.as_ref(),
                )),
            ]),
            account_config: RpcAccountInfoConfig {
                encoding: Some(UiAccountEncoding::Base64),
                commitment: Some(self.commitment),
                ..RpcAccountInfoConfig::default()
            },
            ..RpcProgramAccountsConfig::default()
        };
        Ok(self
            .rpc_client
            .get_program_accounts_with_config(&spl_token::id(), config)
            .await?)
    }

    async fn create_token_account(&self, mint: &Pubkey, owner: &Pubkey) -> IdoResult<Pubkey> {
        let payer = self.payer()?;
        let new_account = Keypair::new();
        let creation_failed = |reason: String| IdoError::AccountCreationFailed {
            mint: *mint,
            reason,
        };
        let lamports = self
            .rpc_client
            .get_minimum_balance_for_rent_exemption(spl_token::state::Account::LEN)
            .await
            .map_err(|e| creation_failed(e.to_string()))?;
        let instructions =
            create_token_account_instr(&payer, &new_account.pubkey(), mint, owner, lamports)
                .map_err(|e| creation_failed(e.to_string()))?;
        let signature = self
            .sign_and_send(&instructions, &[&new_account])
            .await
            .map_err(|e| creation_failed(e.to_string()))?;
        info!(
            "created token account {} for mint {} ({})",
            new_account.pubkey(),
            mint,
            signature
        );
        Ok(new_account.pubkey())
    }

    async fn send_instructions(&self, instructions: &[Instruction]) -> IdoResult<Signature> {
        self.sign_and_send(instructions, &[])
            .await
            .map_err(|e| IdoError::SubmissionError(e.to_string()))
    }
}
