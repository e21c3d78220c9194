//! Inventory ledger transaction classification

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Types of inventory ledger transactions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Goods receipt
    In,
    /// Goods issue (including production deduction)
    Out,
    TransferIn,
    TransferOut,
    AdjustmentIn,
    AdjustmentOut,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::In => "in",
            TransactionType::Out => "out",
            TransactionType::TransferIn => "transfer_in",
            TransactionType::TransferOut => "transfer_out",
            TransactionType::AdjustmentIn => "adjustment_in",
            TransactionType::AdjustmentOut => "adjustment_out",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "in" => Some(TransactionType::In),
            "out" => Some(TransactionType::Out),
            "transfer_in" => Some(TransactionType::TransferIn),
            "transfer_out" => Some(TransactionType::TransferOut),
            "adjustment_in" => Some(TransactionType::AdjustmentIn),
            "adjustment_out" => Some(TransactionType::AdjustmentOut),
        _ => None,
        }
    }

    /// Sign class of the transaction type; the exhaustive match guarantees
    /// any new type must declare its direction
    pub fn direction(&self) -> StockDirection {
        match self {
            TransactionType::In | TransactionType::TransferIn | TransactionType::AdjustmentIn => {
                StockDirection::Inbound
            }
            TransactionType::Out
            | TransactionType::TransferOut
            | TransactionType::AdjustmentOut => StockDirection::Outbound,
        }
    }

    /// Signed quantity change this transaction applies to a lot's on-hand
    pub fn signed(&self, quantity: Decimal) -> Decimal {
        match self.direction() {
            StockDirection::Inbound => quantity,
            StockDirection::Outbound => -quantity,
        }
    }
}

/// Whether a transaction increases or decreases on-hand quantity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockDirection {
    Inbound,
    Outbound,
}

impl StockDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockDirection::Inbound => "inbound",
            StockDirection::Outbound => "outbound",
        }
    }
}

/// Replay a lot's ledger history into its on-hand balance.
///
/// The cached `quantity` on a lot is a materialized view of this sum; the
/// backend's verify operation compares the two to detect drift.
pub fn replay_balance(entries: &[(TransactionType, Decimal)]) -> Decimal {
    entries
        .iter()
        .fold(Decimal::ZERO, |acc, (tx_type, qty)| acc + tx_type.signed(*qty))
}
