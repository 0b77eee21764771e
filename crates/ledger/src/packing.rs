//! Storage-word packing for account records.
//!
//! The on-chain deployment keeps each account in a single 256-bit word:
//! pending stake and staked principal in 112 bits each, the last-settled
//! epoch in 31, and the unstake flag in the low bit. The adapter checks
//! the field widths so an over-wide value is caught at pack time instead
//! of silently truncated.

use primitive_types::U256;

const AMOUNT_BITS: u32 = 112;
const EPOCH_BITS: u32 = 31;

const STAKED_SHIFT: u32 = 32;
const PENDING_SHIFT: u32 = STAKED_SHIFT + AMOUNT_BITS;

const AMOUNT_MAX: u128 = (1 << AMOUNT_BITS) - 1;
const EPOCH_MAX: u64 = (1 << EPOCH_BITS) - 1;

/// The word-packable slice of an account record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedAccount {
    pub pending_stake: u128,
    pub staked: u128,
    pub last_settled_epoch: u64,
    pub unstake_requested: bool,
}

impl PackedAccount {
    /// Pack into one word, `None` if any field exceeds its width.
    pub fn pack(&self) -> Option<U256> {
        if self.pending_stake > AMOUNT_MAX
            || self.staked > AMOUNT_MAX
            || self.last_settled_epoch > EPOCH_MAX
        {
            return None;
        }
        let mut word = U256::from(self.pending_stake) << PENDING_SHIFT;
        word |= U256::from(self.staked) << STAKED_SHIFT;
        word |= U256::from(self.last_settled_epoch) << 1;
        word |= U256::from(u8::from(self.unstake_requested));
        Some(word)
    }

    /// Inverse of [`Self::pack`]; total, every word decodes.
    pub fn unpack(word: U256) -> Self {
        let mask = U256::from(AMOUNT_MAX);
        PackedAccount {
            pending_stake: ((word >> PENDING_SHIFT) & mask).low_u128(),
            staked: ((word >> STAKED_SHIFT) & mask).low_u128(),
            last_settled_epoch: ((word >> 1) & U256::from(EPOCH_MAX)).low_u64(),
            unstake_requested: !(word & U256::one()).is_zero(),
        }
    }
}
