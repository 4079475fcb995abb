use anchor_lang::AccountDeserialize;
use anyhow::Result;
use solana_sdk::{account::Account, pubkey::Pubkey};
use spl_token::solana_program::program_pack::Pack;
use spl_token::state::{Account as SplTokenAccount, Mint};

use crate::error::{IdoError, IdoResult};
use crate::ido_pool::PoolAccount;
use crate::resolver::{MintAccount, OwnedTokenAccount};

pub fn deserialize_anchor_account<T: AccountDeserialize>(account: &Account) -> Result<T> {
    let mut data: &[u8] = &account.data;
    T::try_deserialize(&mut data).map_err(Into::into)
}

/// Program-derived authority of the pool. Seeds: `[sale_mint]`.
///
/// The bump is the first nonce, scanning down from 255, whose address falls
/// off the ed25519 curve.
pub fn get_pool_signer_address(sale_mint: &Pubkey, program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[sale_mint.as_ref()], program_id)
}

pub fn decode_pool_account(address: Pubkey, account: Option<&Account>) -> IdoResult<PoolAccount> {
    let account = account.ok_or_else(|| IdoError::not_found(address, "pool"))?;
    deserialize_anchor_account::<PoolAccount>(account)
        .map_err(|_| IdoError::not_found(address, "pool"))
}

pub fn decode_mint_account(address: Pubkey, account: Option<&Account>) -> IdoResult<MintAccount> {
    let account = account.ok_or_else(|| IdoError::not_found(address, "mint"))?;
    let mint = Mint::unpack(&account.data).map_err(|_| IdoError::not_found(address, "mint"))?;
    Ok(MintAccount {
        address,
        decimals: mint.decimals,
        supply: mint.supply,
    })
}

pub fn decode_token_account(address: Pubkey, account: &Account) -> IdoResult<OwnedTokenAccount> {
    let state = SplTokenAccount::unpack(&account.data)
        .map_err(|_| IdoError::not_found(address, "token"))?;
    Ok(OwnedTokenAccount {
        address,
        owner: state.owner,
        mint: state.mint,
        amount: state.amount,
    })
}

/// First owned account holding `mint`. Uniqueness per mint is not enforced
/// on the ledger, so any match is as good as another.
pub fn find_token_account_for_mint<'a>(
    owned: &'a [OwnedTokenAccount],
    mint: &Pubkey,
) -> Option<&'a OwnedTokenAccount> {
    owned.iter().find(|account| account.mint == *mint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn missing_mint_is_account_not_found() {
        let address = Pubkey::new_unique();
        assert_eq!(
            decode_mint_account(address, None).unwrap_err(),
            IdoError::not_found(address, "mint")
        );
    }

    #[test]
    fn garbage_pool_data_is_account_not_found() {
        let address = Pubkey::new_unique();
        let account = Account {
            data: vec![1, 2, 3],
            ..Account::default()
        };
        assert!(matches!(
            decode_pool_account(address, Some(&account)),
            Err(IdoError::AccountNotFound { kind: "pool", .. })
        ));
    }

    #[test]
    fn first_matching_token_account_wins() {
        let mint = Pubkey::new_unique();
        let owner = Pubkey::new_unique();
        let owned: Vec<OwnedTokenAccount> = (0..3)
            .map(|i| OwnedTokenAccount {
                address: Pubkey::new_unique(),
                owner,
                mint: if i == 0 { Pubkey::new_unique() } else { mint },
                amount: i,
            })
            .collect();
        let found = find_token_account_for_mint(&owned, &mint).unwrap();
        assert_eq!(found.address, owned[1].address);
        assert!(find_token_account_for_mint(&owned, &Pubkey::new_unique()).is_none());
    }

    proptest! {
        #[test]
        fn pool_signer_derivation_is_pure(mint in any::<[u8; 32]>(), program in any::<[u8; 32]>()) {
            let mint = Pubkey::new_from_array(mint);
            let program = Pubkey::new_from_array(program);
            let first = get_pool_signer_address(&mint, &program);
            let second = get_pool_signer_address(&mint, &program);
            prop_assert_eq!(first, second);
            prop_assert!(!first.0.is_on_curve());
        }
    }
}
