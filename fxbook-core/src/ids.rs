use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse::<i64>().map(Self)
            }
        }
    };
}

id_type!(
    /// Identifier of a purchase lot. Lower ids break acquisition-time ties.
    LotId
);
id_type!(
    /// Identifier of one lot slice consumed by a sale.
    AllocationId
);
id_type!(
    /// Identifier of a cash, receivable or profit account.
    AccountId
);
id_type!(
    /// Owner of an account: the desk itself, a holder, or a customer.
    HolderId
);
id_type!(
    /// Sale identifier assigned by the caller.
    SaleId
);
id_type!(
    /// Purchase identifier assigned by the caller.
    PurchaseId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_orders() {
        let a: LotId = " 7 ".parse().unwrap();
        let b = LotId::from(12);
        assert!(a < b);
        assert_eq!(a.to_string(), "7");
        assert_eq!(serde_json::to_string(&b).unwrap(), "12");
    }
}
