//! Client-side view of the remote IDO pool program: the pool account layout
//! and the `exchange_usdc_for_redeemable` instruction.

use anchor_lang::prelude::*;
use anchor_lang::{Discriminator, InstructionData};
use solana_sdk::instruction::Instruction;

/// Amount of USDC (base units) deposited by the first bootstrap cycle.
pub const FIRST_DEPOSIT_AMOUNT: u64 = 10_000_349;

/// On-ledger sale pool record.
///
/// Layout: 8-byte discriminator followed by the Borsh-encoded fields.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct PoolAccount {
    pub redeemable_mint: Pubkey,
    pub pool_watermelon: Pubkey,
    /// Mint of the token being sold.
    pub watermelon_mint: Pubkey,
    /// Pool-owned vault collecting deposited USDC.
    pub pool_usdc: Pubkey,
    pub distribution_authority: Pubkey,
    pub nonce: u8,
    pub num_ido_tokens: u64,
    pub start_ido_ts: i64,
    pub end_deposits_ts: i64,
    pub end_ido_ts: i64,
}

impl PoolAccount {
    /// 8 + 32 * 5 + 1 + 8 * 4
    pub const LEN: usize = 8 + 32 * 5 + 1 + 8 * 4;

    pub fn sale_mint(&self) -> Pubkey {
        self.watermelon_mint
    }
}

impl Discriminator for PoolAccount {
    // sha256("account:PoolAccount")[..8]
    const DISCRIMINATOR: &'static [u8] = &[116, 210, 187, 119, 196, 196, 52, 137];
}

impl AccountDeserialize for PoolAccount {
    fn try_deserialize(buf: &mut &[u8]) -> anchor_lang::Result<Self> {
        if buf.len() < Self::DISCRIMINATOR.len() {
            return Err(ErrorCode::AccountDiscriminatorNotFound.into());
        }
        if &buf[..Self::DISCRIMINATOR.len()] != Self::DISCRIMINATOR {
            return Err(ErrorCode::AccountDiscriminatorMismatch.into());
        }
        Self::try_deserialize_unchecked(buf)
    }

    fn try_deserialize_unchecked(buf: &mut &[u8]) -> anchor_lang::Result<Self> {
        let mut data: &[u8] = &buf[Self::DISCRIMINATOR.len()..];
        AnchorDeserialize::deserialize(&mut data)
            .map_err(|_| ErrorCode::AccountDidNotDeserialize.into())
    }
}

impl PoolAccount {
    /// Discriminator-prefixed account data, as the program stores it.
    pub fn to_account_data(&self) -> Vec<u8> {
        let mut data = Self::DISCRIMINATOR.to_vec();
        // Writing into a Vec cannot fail.
        let _ = self.serialize(&mut data);
        data
    }
}

pub mod accounts {
    use super::*;

    /// Accounts of `exchange_usdc_for_redeemable`, in program order.
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub struct ExchangeUsdcForRedeemable {
        pub pool_account: Pubkey,
        pub pool_signer: Pubkey,
        pub redeemable_mint: Pubkey,
        pub pool_usdc: Pubkey,
        pub user_authority: Pubkey,
        pub user_usdc: Pubkey,
        pub user_redeemable: Pubkey,
        pub token_program: Pubkey,
        pub clock: Pubkey,
    }

    impl ToAccountMetas for ExchangeUsdcForRedeemable {
        fn to_account_metas(&self, _is_signer: Option<bool>) -> Vec<AccountMeta> {
            vec![
                AccountMeta::new(self.pool_account, false),
                AccountMeta::new_readonly(self.pool_signer, false),
                AccountMeta::new(self.redeemable_mint, false),
                AccountMeta::new(self.pool_usdc, false),
                AccountMeta::new_readonly(self.user_authority, true),
                AccountMeta::new(self.user_usdc, false),
                AccountMeta::new(self.user_redeemable, false),
                AccountMeta::new_readonly(self.token_program, false),
                AccountMeta::new_readonly(self.clock, false),
            ]
        }
    }
}

pub mod instruction {
    use super::*;

    #[derive(AnchorSerialize, AnchorDeserialize, Clone, Debug, PartialEq, Eq)]
    pub struct ExchangeUsdcForRedeemable {
        pub amount: u64,
    }

    impl Discriminator for ExchangeUsdcForRedeemable {
        // sha256("global:exchange_usdc_for_redeemable")[..8]
        const DISCRIMINATOR: &'static [u8] = &[55, 158, 33, 1, 37, 196, 133, 251];
    }

    impl InstructionData for ExchangeUsdcForRedeemable {}
}

/// Build a program instruction from an accounts struct and its arguments.
pub fn build_instruction(
    program_id: Pubkey,
    accounts: &impl ToAccountMetas,
    args: &impl InstructionData,
) -> Instruction {
    Instruction {
        program_id,
        accounts: accounts.to_account_metas(None),
        data: args.data(),
    }
}
