//! Transfer fee policy
//!
//! A batch pays either a flat fee or, under dynamic fees, a per-destination
//! fee times its destination count. When miners pay the fee, each payee's
//! share is deducted from its payout.

use crate::config::{MinerFeeShare, PaymentsConfig};
use crate::types::Amount;

/// Fee settings resolved from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeePolicy {
    pub transfer_fee: Amount,
    pub dynamic: bool,
    pub fee_per_payee: Amount,
    pub miner_pays: bool,
    pub share_mode: MinerFeeShare,
}

impl FeePolicy {
    pub fn from_config(config: &PaymentsConfig) -> Self {
        Self {
            transfer_fee: config.transfer_fee,
            dynamic: config.use_dynamic_transfer_fee,
            fee_per_payee: config.transfer_fee_per_payee,
            miner_pays: config.miner_pays_fee,
            share_mode: config.miner_fee_share,
        }
    }

    /// Fee share deducted from each payee's payout
    ///
    /// Only non-zero when dynamic fees are on and miners pay them.
    pub fn miner_fee_share(&self) -> Amount {
        if self.dynamic && self.miner_pays {
            self.fee_per_payee
        } else {
            0
        }
    }

    /// Share charged on an additional destination of an already-charged account
    pub fn carried_fee_share(&self) -> Amount {
        match self.share_mode {
            MinerFeeShare::PerAccount => 0,
            MinerFeeShare::PerDestination => self.miner_fee_share(),
        }
    }

    /// Fee for a sealed batch with `destination_count` payees
    pub fn batch_fee(&self, destination_count: usize) -> Amount {
        if self.dynamic {
            self.fee_per_payee * destination_count as Amount
        } else {
            self.transfer_fee
        }
    }
}
