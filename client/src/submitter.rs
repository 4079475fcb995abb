use anyhow::format_err;
use log::{error, info};
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;

use crate::error::{IdoError, IdoResult};
use crate::instructions::ido_instructions::exchange_usdc_for_redeemable_instr;
use crate::ledger::Ledger;
use crate::resolver::ResolvedDepositContext;
use crate::state::DepositOutcome;

/// How a rejected deposit affects the surrounding bootstrap cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SubmissionMode {
    /// Log and report the failure; the cycle still completes.
    #[default]
    BestEffort,
    /// A failed deposit fails the cycle.
    Strict,
}

impl FromStr for SubmissionMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim() {
            "best_effort" => Ok(SubmissionMode::BestEffort),
            "strict" => Ok(SubmissionMode::Strict),
            other => Err(format_err!("unknown submission_mode {}", other)),
        }
    }
}

pub struct DepositSubmitter<'a, L: Ledger> {
    ledger: &'a L,
    program_id: Pubkey,
    mode: SubmissionMode,
}

impl<'a, L: Ledger> DepositSubmitter<'a, L> {
    pub fn new(ledger: &'a L, program_id: Pubkey, mode: SubmissionMode) -> Self {
        DepositSubmitter {
            ledger,
            program_id,
            mode,
        }
    }

    /// Send `exchange_usdc_for_redeemable` for the resolved accounts.
    ///
    /// In best-effort mode every failure is folded into
    /// `DepositOutcome::Failed`; in strict mode it is returned as
    /// `IdoError::SubmissionError`.
    pub async fn submit(&self, ctx: &ResolvedDepositContext) -> IdoResult<DepositOutcome> {
        match self.send(ctx).await {
            Ok(signature) => {
                info!("deposit of {} confirmed: {}", ctx.deposit_amount, signature);
                Ok(DepositOutcome::Confirmed(signature))
            }
            Err(err) => {
                error!("deposit of {} failed: {}", ctx.deposit_amount, err);
                match self.mode {
                    SubmissionMode::BestEffort => Ok(DepositOutcome::Failed(err.to_string())),
                    SubmissionMode::Strict => Err(match err {
                        err @ IdoError::SubmissionError(_) => err,
                        other => IdoError::SubmissionError(other.to_string()),
                    }),
                }
            }
        }
    }

    async fn send(&self, ctx: &ResolvedDepositContext) -> IdoResult<solana_sdk::signature::Signature> {
        let instructions = exchange_usdc_for_redeemable_instr(self.program_id, ctx)
            .map_err(|e| IdoError::SubmissionError(e.to_string()))?;
        self.ledger.send_instructions(&instructions).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::mock::MockLedger;
    use crate::resolver::DerivedSigner;

    fn context() -> ResolvedDepositContext {
        ResolvedDepositContext {
            pool_account: Pubkey::new_unique(),
            pool_signer: DerivedSigner {
                address: Pubkey::new_unique(),
                nonce: 255,
            },
            redeemable_mint: Pubkey::new_unique(),
            pool_usdc: Pubkey::new_unique(),
            user_authority: Pubkey::new_unique(),
            user_usdc: Pubkey::new_unique(),
            user_redeemable: Pubkey::new_unique(),
            deposit_amount: 10,
        }
    }

    #[tokio::test]
    async fn confirmed_deposit_returns_signature() {
        let ledger = MockLedger::default();
        let program_id = Pubkey::new_unique();
        let submitter = DepositSubmitter::new(&ledger, program_id, SubmissionMode::BestEffort);
        let outcome = submitter.submit(&context()).await.unwrap();
        assert!(matches!(outcome, DepositOutcome::Confirmed(_)));
        let sent = ledger.sent.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].program_id, program_id);
    }

    #[tokio::test]
    async fn best_effort_swallows_rejection() {
        let ledger = MockLedger::default();
        ledger.fail_send.set(true);
        let submitter =
            DepositSubmitter::new(&ledger, Pubkey::new_unique(), SubmissionMode::BestEffort);
        let outcome = submitter.submit(&context()).await.unwrap();
        assert!(matches!(outcome, DepositOutcome::Failed(msg) if msg.contains("simulation")));
    }

    #[tokio::test]
    async fn strict_mode_propagates_rejection() {
        let ledger = MockLedger::default();
        ledger.fail_send.set(true);
        let submitter = DepositSubmitter::new(&ledger, Pubkey::new_unique(), SubmissionMode::Strict);
        assert!(matches!(
            submitter.submit(&context()).await,
            Err(IdoError::SubmissionError(_))
        ));
    }

    #[test]
    fn submission_mode_parses_config_values() {
        assert_eq!(
            "strict".parse::<SubmissionMode>().unwrap(),
            SubmissionMode::Strict
        );
        assert_eq!(
            " best_effort".parse::<SubmissionMode>().unwrap(),
            SubmissionMode::BestEffort
        );
        assert!("sometimes".parse::<SubmissionMode>().is_err());
    }
}
