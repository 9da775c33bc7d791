//! Oblivious decision-tree evaluation over homomorphically encrypted inputs.
//!
//! The server evaluates a public tree on encrypted features through a
//! [`HomomorphicEngine`]: one bit-sliced [`SecureComparator`] per internal
//! node, selection by arithmetic. Only the [`Client`] holding the secret key
//! can read the encrypted verdict.

#![forbid(unsafe_code)]
#![warn(clippy::pedantic, missing_docs)]

pub mod client;
pub mod comparator;
pub mod config;
pub mod encoding;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod packing;
pub mod tree;

pub use client::Client;
pub use comparator::SecureComparator;
pub use config::Config;
pub use encoding::BIT_WIDTH;
pub use engine::{
    AcesEngine, AcesParams, AcesSecretKey, ClearEngine, ClearParams, ClearSecretKey, Decryptor,
    HomomorphicEngine,
};
pub use error::{Error, Result};
pub use evaluator::{required_depth, DecisionTreeEvaluator, EvaluatorOptions};
pub use tree::Node;
