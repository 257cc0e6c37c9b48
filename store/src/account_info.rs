//! Per-account aggregate over unconsumed sends.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use trellis_types::{Amount, TokenId};

/// Aggregate balance of all on-road sends targeting one token.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBalance {
    pub total_amount: Amount,
    pub number: u64,
}

/// Aggregate over all unconsumed sends targeting an account.
///
/// Invariant: the sum of all `TokenBalance::number` equals `total_number`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommonAccountInfo {
    pub total_number: u64,
    pub token_balances: HashMap<TokenId, TokenBalance>,
}

impl CommonAccountInfo {
    pub fn is_empty(&self) -> bool {
        self.total_number == 0
    }
}
