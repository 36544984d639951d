//! The validator power map read from the client chain's `Bridge` contract.

use alloy_primitives::{Address, U256};
use std::collections::HashMap;

/// Mapping of oracle-chain validator address to voting power, as read from
/// `Bridge.getAllValidatorPowers()`.
///
/// Treated as immutable for the duration of a single trim operation
/// (`spec.md` §3). Construction rejects duplicate addresses.
#[derive(Debug, Clone, Default)]
pub struct ValidatorPowerMap {
    powers: HashMap<Address, U256>,
    total_power: U256,
}

/// A validator address appeared more than once in the Bridge contract's response.
///
/// This is a hard invariant violation (`spec.md` §3, §7): the worker treats it as
/// fatal for the current relay cycle, not for the process.
#[derive(Debug, thiserror::Error)]
#[error("duplicate validator address in Bridge response: {0}")]
pub struct DuplicateValidator(pub Address);

impl ValidatorPowerMap {
    /// Builds a power map from `(address, power)` pairs in contract-read order.
    ///
    /// # Errors
    /// Returns [`DuplicateValidator`] if any address repeats.
    pub fn try_from_pairs(
        pairs: impl IntoIterator<Item = (Address, U256)>,
    ) -> Result<Self, DuplicateValidator> {
        let mut powers = HashMap::new();
        let mut total_power = U256::ZERO;
        for (addr, power) in pairs {
            if powers.insert(addr, power).is_some() {
                return Err(DuplicateValidator(addr));
            }
            total_power += power;
        }
        Ok(Self {
            powers,
            total_power,
        })
    }

    pub fn total_power(&self) -> U256 {
        self.total_power
    }

    pub fn power_of(&self, addr: &Address) -> Option<U256> {
        self.powers.get(addr).copied()
    }

    pub fn len(&self) -> usize {
        self.powers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.powers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    #[test]
    fn rejects_duplicate_addresses() {
        let a = address!("0x1111111111111111111111111111111111111111");
        let pairs = [(a, U256::from(10)), (a, U256::from(20))];
        let err = ValidatorPowerMap::try_from_pairs(pairs).unwrap_err();
        assert_eq!(err.0, a);
    }

    #[test]
    fn sums_total_power() {
        let a = address!("0x1111111111111111111111111111111111111111");
        let b = address!("0x2222222222222222222222222222222222222222");
        let map =
            ValidatorPowerMap::try_from_pairs([(a, U256::from(30)), (b, U256::from(70))]).unwrap();
        assert_eq!(map.total_power(), U256::from(100));
        assert_eq!(map.power_of(&a), Some(U256::from(30)));
        assert_eq!(map.len(), 2);
    }
}
