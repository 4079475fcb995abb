use anyhow::Result;
use solana_sdk::{instruction::Instruction, pubkey::Pubkey, system_instruction};
use spl_token::solana_program::program_pack::Pack;

use crate::ido_pool::{accounts as ido_accounts, build_instruction, instruction as ido_instructions};
use crate::resolver::ResolvedDepositContext;

/// Swap `ctx.deposit_amount` USDC for redeemable tokens.
pub fn exchange_usdc_for_redeemable_instr(
    program_id: Pubkey,
    ctx: &ResolvedDepositContext,
) -> Result<Vec<Instruction>> {
    let accounts = ido_accounts::ExchangeUsdcForRedeemable {
        pool_account: ctx.pool_account,
        pool_signer: ctx.pool_signer.address,
        redeemable_mint: ctx.redeemable_mint,
        pool_usdc: ctx.pool_usdc,
        user_authority: ctx.user_authority,
        user_usdc: ctx.user_usdc,
        user_redeemable: ctx.user_redeemable,
        token_program: spl_token::id(),
        clock: solana_sdk::sysvar::clock::id(),
    };
    let args = ido_instructions::ExchangeUsdcForRedeemable {
        amount: ctx.deposit_amount,
    };
    Ok(vec![build_instruction(program_id, &accounts, &args)])
}

/// Allocate `new_account` under the token program and initialise it for `mint`.
pub fn create_token_account_instr(
    payer: &Pubkey,
    new_account: &Pubkey,
    mint: &Pubkey,
    owner: &Pubkey,
    lamports: u64,
) -> Result<Vec<Instruction>> {
    let instructions = vec![
        system_instruction::create_account(
            payer,
            new_account,
            lamports,
            spl_token::state::Account::LEN as u64,
            &spl_token::id(),
        ),
        spl_token::instruction::initialize_account(&spl_token::id(), new_account, mint, owner)?,
    ];
    Ok(instructions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::DerivedSigner;
    use anchor_lang::Discriminator;

    #[test]
    fn exchange_instruction_references_resolved_accounts_in_order() {
        let program_id = Pubkey::new_unique();
        let ctx = ResolvedDepositContext {
            pool_account: Pubkey::new_unique(),
            pool_signer: DerivedSigner {
                address: Pubkey::new_unique(),
                nonce: 253,
            },
            redeemable_mint: Pubkey::new_unique(),
            pool_usdc: Pubkey::new_unique(),
            user_authority: Pubkey::new_unique(),
            user_usdc: Pubkey::new_unique(),
            user_redeemable: Pubkey::new_unique(),
            deposit_amount: 42,
        };
        let ixs = exchange_usdc_for_redeemable_instr(program_id, &ctx).unwrap();
        assert_eq!(ixs.len(), 1);
        let ix = &ixs[0];
        assert_eq!(ix.program_id, program_id);
        let keys: Vec<Pubkey> = ix.accounts.iter().map(|m| m.pubkey).collect();
        assert_eq!(
            keys,
            vec![
                ctx.pool_account,
                ctx.pool_signer.address,
                ctx.redeemable_mint,
                ctx.pool_usdc,
                ctx.user_authority,
                ctx.user_usdc,
                ctx.user_redeemable,
                spl_token::id(),
                solana_sdk::sysvar::clock::id(),
            ]
        );
        assert_eq!(
            &ix.data[..8],
            ido_instructions::ExchangeUsdcForRedeemable::DISCRIMINATOR
        );
        assert_eq!(&ix.data[8..], &42u64.to_le_bytes());
    }

    #[test]
    fn token_account_creation_allocates_then_initialises() {
        let payer = Pubkey::new_unique();
        let new_account = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let ixs = create_token_account_instr(&payer, &new_account, &mint, &payer, 2_039_280).unwrap();
        assert_eq!(ixs.len(), 2);
        assert_eq!(ixs[0].program_id, solana_sdk::system_program::id());
        assert_eq!(ixs[1].program_id, spl_token::id());
        assert_eq!(ixs[1].accounts[0].pubkey, new_account);
        assert_eq!(ixs[1].accounts[1].pubkey, mint);
    }
}
