//! Identifiers and unit types shared by the vault and the splitter.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Amount of the vault's unit-of-account, in its smallest indivisible unit.
pub type Amount = u128;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id!(
    /// Identity of a pluggable strategy.
    StrategyId
);
string_id!(
    /// Unit-of-account managed by a vault (e.g. "USDC").
    AssetId
);
string_id!(
    /// Permission root shared by a vault and its strategies.
    ControllerId
);
string_id!(
    /// Identity of a splitter; strategies name exactly one splitter as caller.
    SplitterId
);
string_id!(
    /// Share holder.
    AccountId
);

impl AccountId {
    /// Holder of the permanently locked initial shares.
    pub fn dead() -> Self {
        Self::new("0x000000000000000000000000000000000000dead")
    }
}
