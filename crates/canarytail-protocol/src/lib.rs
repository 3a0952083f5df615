//! CanaryTail protocol - warrant canary claims and their authentication.
//!
//! A canary is a periodically re-issued claim, signed field by field by
//! every member of a signer roster, anchored in time by a public blockchain
//! block hash. Consumers validate it independently: a missing, stale,
//! expired, under-signed or panic-signed canary is itself the signal.

pub mod canary;
pub mod canonical;
pub mod claim;
pub mod codes;
pub mod config;
pub mod constants;
pub mod crypto;
pub mod error;
pub mod store;
pub mod temporal;
pub mod threshold;
pub mod validate;

pub use canary::*;
pub use claim::*;
pub use codes::*;
pub use config::ValidatorConfig;
pub use constants::*;
pub use error::*;
pub use temporal::BlockTimeOracle;
pub use validate::{validate, validate_at, Validator};
