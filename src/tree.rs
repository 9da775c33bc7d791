//! Plaintext decision-tree model.
//!
//! Trees are plain data: topology, thresholds and leaf values are public.
//! They serialize as externally tagged JSON:
//!
//! ```json
//! {"internal": {"feature": 0, "threshold": -27,
//!               "left": {"leaf": 20}, "right": {"leaf": 10}}}
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::encoding::check_range;
use crate::error::{Error, Result};

/// A node in the tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Node {
    /// Comparison with two subtrees.
    Internal(Box<Internal>),
    /// Output value.
    Leaf(i64),
}

/// Decision node: go left iff `input[feature] < threshold`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Internal {
    /// Index into the feature vector.
    pub feature: usize,
    /// Public comparison threshold.
    pub threshold: i64,
    /// Taken when the feature is below the threshold.
    pub left: Node,
    /// Taken otherwise.
    pub right: Node,
}

impl Node {
    /// Terminal node returning `value`.
    #[must_use]
    pub fn leaf(value: i64) -> Self {
        Self::Leaf(value)
    }

    /// Decision node on `feature < threshold`.
    #[must_use]
    pub fn internal(feature: usize, threshold: i64, left: Node, right: Node) -> Self {
        Self::Internal(Box::new(Internal {
            feature,
            threshold,
            left,
            right,
        }))
    }

    /// The three-leaf demonstration tree:
    /// `x0 < -27 ? (x1 < -17 ? 20 : 30) : 10`.
    #[must_use]
    pub fn reference() -> Self {
        Self::internal(
            0,
            -27,
            Self::internal(1, -17, Self::leaf(20), Self::leaf(30)),
            Self::leaf(10),
        )
    }

    /// Parse a tree from its JSON form.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read and parse a JSON tree file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    /// Pretty-printed JSON form, as accepted by [`Node::from_json`].
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Evaluate in the clear.
    pub fn evaluate(&self, features: &[i64]) -> Result<i64> {
        let mut node = self;
        loop {
            match node {
                Self::Leaf(value) => return Ok(*value),
                Self::Internal(n) => {
                    let x = features
                        .get(n.feature)
                        .ok_or(Error::MissingFeature(n.feature))?;
                    node = if *x < n.threshold { &n.left } else { &n.right };
                }
            }
        }
    }

    /// Count the number of internal nodes.
    pub fn count_internal(&self) -> usize {
        match self {
            Self::Internal(n) => 1 + n.left.count_internal() + n.right.count_internal(),
            Self::Leaf(_) => 0,
        }
    }

    /// Count the number of leaves.
    pub fn count_leaves(&self) -> usize {
        match self {
            Self::Internal(n) => n.left.count_leaves() + n.right.count_leaves(),
            Self::Leaf(_) => 1,
        }
    }

    /// Internal nodes on the longest root-to-leaf path.
    pub fn height(&self) -> usize {
        match self {
            Self::Internal(n) => 1 + n.left.height().max(n.right.height()),
            Self::Leaf(_) => 0,
        }
    }

    /// One past the largest feature index referenced, i.e. the minimum input length.
    pub fn feature_count(&self) -> usize {
        match self {
            Self::Internal(n) => (n.feature + 1)
                .max(n.left.feature_count())
                .max(n.right.feature_count()),
            Self::Leaf(_) => 0,
        }
    }

    /// Fail if any threshold or leaf value does not fit in `width` bits.
    pub fn validate(&self, width: usize) -> Result<()> {
        match self {
            Self::Internal(n) => {
                check_range(n.threshold, width)?;
                n.left.validate(width)?;
                n.right.validate(width)
            }
            Self::Leaf(value) => check_range(*value, width),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_tree_scenarios() {
        let tree = Node::reference();
        assert_eq!(tree.evaluate(&[10, 23, 18]).unwrap(), 10);
        assert_eq!(tree.evaluate(&[-30, 23, 18]).unwrap(), 30);
        assert_eq!(tree.evaluate(&[-30, -20, 18]).unwrap(), 20);
    }

    #[test]
    fn test_shape_statistics() {
        let tree = Node::reference();
        assert_eq!(tree.count_internal(), 2);
        assert_eq!(tree.count_leaves(), 3);
        assert_eq!(tree.height(), 2);
        assert_eq!(tree.feature_count(), 2);
        assert_eq!(Node::leaf(4).height(), 0);
        assert_eq!(Node::leaf(4).feature_count(), 0);
    }

    #[test]
    fn test_json_round_trip() {
        let json = r#"{"internal": {"feature": 0, "threshold": -27,
            "left": {"internal": {"feature": 1, "threshold": -17,
                                  "left": {"leaf": 20}, "right": {"leaf": 30}}},
            "right": {"leaf": 10}}}"#;
        let tree = Node::from_json(json).unwrap();
        assert_eq!(tree, Node::reference());
        assert_eq!(Node::from_json(&tree.to_json().unwrap()).unwrap(), tree);
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            Node::from_json(r#"{"branch": 3}"#),
            Err(Error::InvalidTree(_))
        ));
    }

    #[test]
    fn test_missing_feature() {
        let tree = Node::internal(3, 0, Node::leaf(1), Node::leaf(2));
        assert!(matches!(tree.evaluate(&[1, 2]), Err(Error::MissingFeature(3))));
    }

    #[test]
    fn test_validate_range() {
        assert!(Node::reference().validate(16).is_ok());
        let big = Node::internal(0, 40_000, Node::leaf(1), Node::leaf(2));
        assert!(matches!(
            big.validate(16),
            Err(Error::ValueOutOfRange { value: 40_000, .. })
        ));
        assert!(Node::leaf(-40_000).validate(16).is_err());
    }
}
