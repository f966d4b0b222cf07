//! Transfer service request and response types
//!
//! Field names follow the wallet `transfer` call so the request can be
//! serialized directly as RPC params.

use serde::{Deserialize, Serialize};

use super::account::{Address, Amount};
use super::batch::Batch;

/// One payee of a transfer request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferDestination {
    pub amount: Amount,
    pub address: Address,
}

/// Request for a single settlement transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub destinations: Vec<TransferDestination>,
    pub fee: Amount,
    pub mixin: u64,
    pub unlock_time: u64,
}

impl TransferRequest {
    /// Build the transfer request for a sealed batch
    ///
    /// Unlock time is always 0: payouts are spendable immediately.
    pub fn for_batch(batch: &Batch, mixin: u64) -> Self {
        TransferRequest {
            destinations: batch
                .destinations
                .iter()
                .map(|d| TransferDestination {
                    amount: d.amount,
                    address: d.address.clone(),
                })
                .collect(),
            fee: batch.fee,
            mixin,
            unlock_time: 0,
        }
    }
}

/// Successful transfer response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceipt {
    /// Transaction hash, possibly wrapped in `<`/`>` delimiters
    pub tx_hash: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Destination;

    #[test]
    fn test_request_for_batch_copies_destinations_and_fee() {
        let batch = Batch {
            destinations: vec![
                Destination {
                    address: "w1".to_string(),
                    amount: 150,
                    fee_share: 10,
                },
                Destination {
                    address: "w2".to_string(),
                    amount: 50,
                    fee_share: 10,
                },
            ],
            amount: 200,
            fee: 20,
        };

        let request = TransferRequest::for_batch(&batch, 3);

        assert_eq!(request.fee, 20);
        assert_eq!(request.mixin, 3);
        assert_eq!(request.unlock_time, 0);
        assert_eq!(
            request.destinations,
            vec![
                TransferDestination {
                    amount: 150,
                    address: "w1".to_string()
                },
                TransferDestination {
                    amount: 50,
                    address: "w2".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_request_serializes_with_wallet_field_names() {
        let request = TransferRequest {
            destinations: vec![TransferDestination {
                amount: 5,
                address: "w1".to_string(),
            }],
            fee: 1,
            mixin: 0,
            unlock_time: 0,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["destinations"][0]["amount"], 5);
        assert_eq!(json["destinations"][0]["address"], "w1");
        assert_eq!(json["unlock_time"], 0);
    }
}
