//! I/O module
//!
//! Adapters between the payout pipeline and the outside world.
//!
//! # Components
//!
//! - `redis_store` - Ledger store on a Redis server
//! - `wallet_rpc` - Transfer service over wallet JSON-RPC
//! - `memory_store` - In-memory ledger store with failure injection
//! - `mock_transfer` - Scripted transfer service

pub mod memory_store;
pub mod mock_transfer;
pub mod redis_store;
pub mod wallet_rpc;

pub use memory_store::MemoryStore;
pub use mock_transfer::MockTransfer;
pub use redis_store::{KeySpace, RedisStore};
pub use wallet_rpc::WalletRpcClient;
