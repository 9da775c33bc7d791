//! Crate-wide error type.

use thiserror::Error;

/// Everything that can go wrong between encoding an input and returning a verdict.
#[derive(Debug, Error)]
pub enum Error {
    /// The tree needs more multiplicative depth than the engine was configured with.
    #[error("tree needs multiplicative depth {required} but the engine only provides {available}")]
    DepthBudget {
        /// Exact depth of the arithmetized tree.
        required: u32,
        /// Depth the engine can still evaluate.
        available: u32,
    },

    /// The engine (or its parameters) cannot run the circuit at all.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An operand does not occupy the slot layout the operation expects.
    #[error("shape mismatch in {what}: expected {expected}, found {found}")]
    ShapeMismatch {
        /// What was being checked.
        what: &'static str,
        /// Expected size or bound.
        expected: usize,
        /// Size actually found.
        found: usize,
    },

    /// A host integer does not fit in the fixed bit width.
    #[error("value {value} does not fit in {width} bits")]
    ValueOutOfRange {
        /// The rejected integer.
        value: i64,
        /// Bit width it had to fit.
        width: usize,
    },

    /// The tree references a feature the input vector does not carry.
    #[error("feature {0} is missing from the input vector")]
    MissingFeature(usize),

    /// The homomorphic engine reported corruption or mismatched keys.
    #[error("engine failure: {0}")]
    Engine(String),

    /// A tree document could not be parsed.
    #[error("invalid tree document: {0}")]
    InvalidTree(#[from] serde_json::Error),

    /// Reading a tree or configuration file failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
