use bincode::{Decode, Encode};
use poagov_util_array_type::{array_type_fixed_size_define, array_type_fixed_size_impl_serde};
use serde::Deserialize;

array_type_fixed_size_define! {
    /// An amount in the smallest currency unit
    ///
    /// Stored big-endian so it sorts correctly as a database key.
    #[derive(Encode, Decode, Clone, Copy, Hash)]
    pub struct Amount(u128);
}

array_type_fixed_size_impl_serde!(Amount);

impl Amount {
    /// 10^18 smallest units, the customary whole-coin denomination
    pub const COIN: Self = Self::new(1_000_000_000_000_000_000);

    pub fn is_zero(&self) -> bool {
        self.to_number() == 0
    }

    pub fn checked_add_amount(self, rhs: Amount) -> Option<Self> {
        self.checked_add(rhs.to_number())
    }

    pub fn checked_sub_amount(self, rhs: Amount) -> Option<Self> {
        self.checked_sub(rhs.to_number())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_matches_numeric() {
        assert!(Amount::new(2) < Amount::new(10));
        assert!(Amount::new(0x1_0000_0000) < Amount::new(0x2_0000_0000));
    }

    #[test]
    fn checked_arithmetic() {
        assert_eq!(
            Amount::new(1).checked_add_amount(Amount::new(2)),
            Some(Amount::new(3))
        );
        assert_eq!(Amount::MAX.checked_add_amount(Amount::new(1)), None);
        assert_eq!(Amount::new(1).checked_sub_amount(Amount::new(2)), None);
    }
}
