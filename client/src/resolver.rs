//! Account resolution for a deposit.
//!
//! Each stage consumes the typed output of the previous one, so the order
//! pool -> mints -> signer -> owned accounts -> USDC account -> redeemable
//! account -> context cannot be rearranged.

use log::{debug, info};
use serde::Serialize;
use solana_sdk::pubkey::Pubkey;

use crate::config::NetworkConfig;
use crate::error::{IdoError, IdoResult};
use crate::ido_pool::PoolAccount;
use crate::instructions::utils::{
    decode_mint_account, decode_pool_account, decode_token_account, find_token_account_for_mint,
    get_pool_signer_address,
};
use crate::ledger::Ledger;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MintAccount {
    pub address: Pubkey,
    pub decimals: u8,
    pub supply: u64,
}

/// Token account owned by the connected wallet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct OwnedTokenAccount {
    #[serde(serialize_with = "serialize_pubkey")]
    pub address: Pubkey,
    #[serde(serialize_with = "serialize_pubkey")]
    pub owner: Pubkey,
    #[serde(serialize_with = "serialize_pubkey")]
    pub mint: Pubkey,
    pub amount: u64,
}

fn serialize_pubkey<S: serde::Serializer>(key: &Pubkey, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&key.to_string())
}

/// Program-derived authority of the pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DerivedSigner {
    pub address: Pubkey,
    pub nonce: u8,
}

impl DerivedSigner {
    pub fn derive(sale_mint: &Pubkey, program_id: &Pubkey) -> Self {
        let (address, nonce) = get_pool_signer_address(sale_mint, program_id);
        DerivedSigner { address, nonce }
    }
}

/// Every account referenced by the deposit instruction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedDepositContext {
    pub pool_account: Pubkey,
    pub pool_signer: DerivedSigner,
    pub redeemable_mint: Pubkey,
    pub pool_usdc: Pubkey,
    pub user_authority: Pubkey,
    pub user_usdc: Pubkey,
    pub user_redeemable: Pubkey,
    pub deposit_amount: u64,
}

pub struct PoolStage {
    pub address: Pubkey,
    pub pool: PoolAccount,
}

pub struct MintStage {
    pub pool: PoolStage,
    pub sale_mint: MintAccount,
    pub redeemable_mint: MintAccount,
}

pub struct SignerStage {
    pub mints: MintStage,
    pub signer: DerivedSigner,
}

pub struct OwnedStage {
    pub signer: SignerStage,
    pub owned: Vec<OwnedTokenAccount>,
}

pub struct UsdcStage {
    pub owned: OwnedStage,
    pub user_usdc: Pubkey,
}

pub struct RedeemableStage {
    pub usdc: UsdcStage,
    pub user_redeemable: Pubkey,
}

/// Output of a successful resolution: the deposit context plus the wallet's
/// token accounts as they stand after any creations.
pub struct Resolution {
    pub context: ResolvedDepositContext,
    pub owned_token_accounts: Vec<OwnedTokenAccount>,
}

pub struct AccountResolver<'a, L: Ledger> {
    ledger: &'a L,
    network: &'a NetworkConfig,
    wallet: Pubkey,
    deposit_amount: u64,
}

impl<'a, L: Ledger> AccountResolver<'a, L> {
    pub fn new(ledger: &'a L, network: &'a NetworkConfig, wallet: Pubkey, deposit_amount: u64) -> Self {
        AccountResolver {
            ledger,
            network,
            wallet,
            deposit_amount,
        }
    }

    /// Run every stage in order. Nothing is returned unless all succeed.
    pub async fn resolve(&self) -> IdoResult<Resolution> {
        let pool = self.fetch_pool().await?;
        let mints = self.fetch_mints(pool).await?;
        let signer = self.derive_signer(mints);
        let owned = self.fetch_owned(signer).await?;
        let usdc = self.select_usdc(owned).await?;
        let redeemable = self.select_redeemable(usdc).await?;
        Ok(self.assemble(redeemable))
    }

    pub async fn fetch_pool(&self) -> IdoResult<PoolStage> {
        let address = self.network.ido_pool;
        let accounts = self.ledger.get_multiple_accounts(&[address]).await?;
        let pool = decode_pool_account(address, accounts.first().and_then(Option::as_ref))?;
        info!("pool account {}: {:?}", address, pool);
        Ok(PoolStage { address, pool })
    }

    pub async fn fetch_mints(&self, pool: PoolStage) -> IdoResult<MintStage> {
        let addresses = [pool.pool.sale_mint(), pool.pool.redeemable_mint];
        let accounts = self.ledger.get_multiple_accounts(&addresses).await?;
        let sale_mint = decode_mint_account(addresses[0], accounts.first().and_then(Option::as_ref))?;
        let redeemable_mint =
            decode_mint_account(addresses[1], accounts.get(1).and_then(Option::as_ref))?;
        info!("sale mint {:?}", sale_mint);
        Ok(MintStage {
            pool,
            sale_mint,
            redeemable_mint,
        })
    }

    pub fn derive_signer(&self, mints: MintStage) -> SignerStage {
        let signer = DerivedSigner::derive(&mints.sale_mint.address, &self.network.ido_program);
        info!("pool signer {} (nonce {})", signer.address, signer.nonce);
        SignerStage { mints, signer }
    }

    pub async fn fetch_owned(&self, signer: SignerStage) -> IdoResult<OwnedStage> {
        let raw = self.ledger.get_owned_token_accounts(&self.wallet).await?;
        let owned = raw
            .iter()
            .map(|(address, account)| decode_token_account(*address, account))
            .collect::<IdoResult<Vec<_>>>()?;
        debug!("wallet {} owns {} token accounts", self.wallet, owned.len());
        Ok(OwnedStage { signer, owned })
    }

    pub async fn select_usdc(&self, mut owned: OwnedStage) -> IdoResult<UsdcStage> {
        let user_usdc = self
            .find_or_create(&mut owned.owned, self.network.usdc_mint)
            .await?;
        Ok(UsdcStage { owned, user_usdc })
    }

    pub async fn select_redeemable(&self, mut usdc: UsdcStage) -> IdoResult<RedeemableStage> {
        let redeemable_mint = usdc.owned.signer.mints.pool.pool.redeemable_mint;
        let user_redeemable = self
            .find_or_create(&mut usdc.owned.owned, redeemable_mint)
            .await?;
        Ok(RedeemableStage {
            usdc,
            user_redeemable,
        })
    }

    pub fn assemble(&self, stage: RedeemableStage) -> Resolution {
        let RedeemableStage {
            usdc: UsdcStage { owned, user_usdc },
            user_redeemable,
        } = stage;
        let OwnedStage { signer, owned } = owned;
        let pool = &signer.mints.pool;
        let context = ResolvedDepositContext {
            pool_account: pool.address,
            pool_signer: signer.signer,
            redeemable_mint: pool.pool.redeemable_mint,
            pool_usdc: pool.pool.pool_usdc,
            user_authority: self.wallet,
            user_usdc,
            user_redeemable,
            deposit_amount: self.deposit_amount,
        };
        Resolution {
            context,
            owned_token_accounts: owned,
        }
    }

    /// Reuse the first owned account for `mint`, creating one only if none
    /// exists. Created accounts are appended to `owned`.
    async fn find_or_create(&self, owned: &mut Vec<OwnedTokenAccount>, mint: Pubkey) -> IdoResult<Pubkey> {
        if let Some(account) = find_token_account_for_mint(owned, &mint) {
            return Ok(account.address);
        }
        info!("no token account for mint {}, creating one", mint);
        let address = self
            .ledger
            .create_token_account(&mint, &self.wallet)
            .await
            .map_err(|e| match e {
                err @ IdoError::AccountCreationFailed { .. } => err,
                other => IdoError::AccountCreationFailed {
                    mint,
                    reason: other.to_string(),
                },
            })?;
        owned.push(OwnedTokenAccount {
            address,
            owner: self.wallet,
            mint,
            amount: 0,
        });
        Ok(address)
    }
}
