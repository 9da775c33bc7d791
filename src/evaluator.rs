//! Oblivious decision-tree evaluation.
//!
//! Every internal node becomes `d·eval(L) + (1 - d)·eval(R)` where `d` is the
//! encrypted comparison bit of that node, so the server touches every node
//! and never learns which path was taken.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::comparator::SecureComparator;
use crate::encoding::BIT_WIDTH;
use crate::engine::HomomorphicEngine;
use crate::error::{Error, Result};
use crate::packing::pack_value;
use crate::tree::Node;

/// Evaluation knobs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorOptions {
    /// Evaluate sibling subtrees and the node comparison concurrently.
    pub parallel: bool,
}

/// Exact multiplicative depth of the arithmetized tree.
///
/// A leaf costs nothing; an internal node multiplies the comparison bit
/// (depth `compare_depth`) with each child result.
#[must_use]
pub fn required_depth(tree: &Node, compare_depth: u32) -> u32 {
    match tree {
        Node::Leaf(_) => 0,
        Node::Internal(n) => {
            compare_depth
                .max(required_depth(&n.left, compare_depth))
                .max(required_depth(&n.right, compare_depth))
                + 1
        }
    }
}

/// The tree with thresholds and leaves already encrypted.
enum Prepared<C> {
    Leaf(C),
    Internal {
        feature: usize,
        threshold: C,
        left: Box<Prepared<C>>,
        right: Box<Prepared<C>>,
    },
}

/// A validated tree bound to an engine, ready to evaluate encrypted inputs.
pub struct DecisionTreeEvaluator<'e, E: HomomorphicEngine> {
    engine: &'e E,
    comparator: SecureComparator<'e, E>,
    prepared: Prepared<E::Ciphertext>,
    feature_count: usize,
    required_depth: u32,
    options: EvaluatorOptions,
}

impl<'e, E: HomomorphicEngine> DecisionTreeEvaluator<'e, E> {
    /// Validate `tree` against `engine` and encrypt its constants.
    ///
    /// Nothing is encrypted unless every value fits the bit width, the engine
    /// can host the comparator, and the tree's depth fits the engine's budget.
    pub fn new(engine: &'e E, tree: &Node, options: EvaluatorOptions) -> Result<Self> {
        tree.validate(BIT_WIDTH)?;
        let comparator = SecureComparator::new(engine)?;

        let required = required_depth(tree, comparator.depth());
        let available = engine.remaining_depth();
        if required > available {
            return Err(Error::DepthBudget {
                required,
                available,
            });
        }
        info!(
            internal = tree.count_internal(),
            leaves = tree.count_leaves(),
            required,
            available,
            "tree validated"
        );

        let prepared = prepare(engine, tree)?;
        Ok(Self {
            engine,
            comparator,
            prepared,
            feature_count: tree.feature_count(),
            required_depth: required,
            options,
        })
    }

    /// Depth checked against the engine at construction.
    #[must_use]
    pub fn required_depth(&self) -> u32 {
        self.required_depth
    }

    /// Minimum number of input ciphertexts an evaluation needs.
    #[must_use]
    pub fn feature_count(&self) -> usize {
        self.feature_count
    }

    /// Evaluate the tree on one encrypted integer per feature (window 0 each).
    ///
    /// The result holds the selected leaf's encoding in window 0.
    pub fn evaluate(&self, inputs: &[E::Ciphertext]) -> Result<E::Ciphertext> {
        if inputs.len() < self.feature_count {
            return Err(Error::MissingFeature(self.feature_count - 1));
        }
        let one = self.engine.encrypt(&vec![1; self.engine.slot_count()])?;
        self.eval_node(&self.prepared, inputs, &one)
    }

    fn eval_node(
        &self,
        node: &Prepared<E::Ciphertext>,
        inputs: &[E::Ciphertext],
        one: &E::Ciphertext,
    ) -> Result<E::Ciphertext> {
        let (feature, threshold, left, right) = match node {
            Prepared::Leaf(ct) => return Ok(ct.clone()),
            Prepared::Internal {
                feature,
                threshold,
                left,
                right,
            } => (*feature, threshold, left, right),
        };

        let compare = || self.comparator.compare(&inputs[feature], threshold);
        let (d, (l, r)) = if self.options.parallel {
            rayon::join(compare, || {
                rayon::join(
                    || self.eval_node(left, inputs, one),
                    || self.eval_node(right, inputs, one),
                )
            })
        } else {
            (
                compare(),
                (
                    self.eval_node(left, inputs, one),
                    self.eval_node(right, inputs, one),
                ),
            )
        };
        let (d, l, r) = (d?, l?, r?);

        let engine = self.engine;
        let not_d = engine.sub(one, &d)?;
        let taken = engine.multiply(&d, &l)?;
        let skipped = engine.multiply(&not_d, &r)?;
        debug!(feature, "node evaluated");
        engine.add(&taken, &skipped)
    }
}

fn prepare<E: HomomorphicEngine>(engine: &E, node: &Node) -> Result<Prepared<E::Ciphertext>> {
    let slots = engine.slot_count();
    Ok(match node {
        Node::Leaf(value) => Prepared::Leaf(engine.encrypt(&pack_value(*value, slots)?)?),
        Node::Internal(n) => Prepared::Internal {
            feature: n.feature,
            threshold: engine.encrypt(&pack_value(n.threshold, slots)?)?,
            left: Box::new(prepare(engine, &n.left)?),
            right: Box::new(prepare(engine, &n.right)?),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{AcesEngine, AcesParams, ClearEngine, ClearParams, ClearSecretKey, Decryptor};
    use crate::packing::unpack_value;
    use rand::Rng;

    fn engine(depth_budget: u32) -> (ClearEngine, ClearSecretKey) {
        ClearEngine::generate_keypair(ClearParams {
            slots: 16,
            plaintext_modulus: 2,
            depth_budget,
        })
        .unwrap()
    }

    fn run(eng: &ClearEngine, sk: &ClearSecretKey, tree: &Node, features: &[i64], parallel: bool) -> i64 {
        let evaluator = DecisionTreeEvaluator::new(eng, tree, EvaluatorOptions { parallel }).unwrap();
        let inputs: Vec<_> = features
            .iter()
            .map(|&x| eng.encrypt(&pack_value(x, 16).unwrap()).unwrap())
            .collect();
        let result = evaluator.evaluate(&inputs).unwrap();
        unpack_value(&sk.decrypt(eng, &result).unwrap(), 0).unwrap()
    }

    fn random_tree<R: Rng>(rng: &mut R, height: usize, features: usize) -> Node {
        if height == 0 || rng.gen_bool(0.25) {
            return Node::leaf(rng.gen_range(-32768..=32767));
        }
        Node::internal(
            rng.gen_range(0..features),
            rng.gen_range(-32768..=32767),
            random_tree(rng, height - 1, features),
            random_tree(rng, height - 1, features),
        )
    }

    #[test]
    fn test_required_depth() {
        assert_eq!(required_depth(&Node::leaf(1), 17), 0);
        assert_eq!(required_depth(&Node::reference(), 17), 19);
        let chain = Node::internal(0, 0, Node::reference(), Node::leaf(0));
        assert_eq!(required_depth(&chain, 17), 20);
        assert!(required_depth(&chain, 17) <= chain.height() as u32 * 18);
    }

    #[test]
    fn test_reference_scenarios() {
        let (eng, sk) = engine(19);
        let tree = Node::reference();
        assert_eq!(run(&eng, &sk, &tree, &[10, 23, 18], false), 10);
        assert_eq!(run(&eng, &sk, &tree, &[-30, 23, 18], false), 30);
        assert_eq!(run(&eng, &sk, &tree, &[-30, -20, 18], false), 20);
    }

    #[test]
    fn test_random_trees_match_plaintext() {
        let (eng, sk) = engine(64);
        let mut rng = rand::thread_rng();
        for _ in 0..6 {
            let tree = random_tree(&mut rng, 3, 3);
            let features: Vec<i64> = (0..3).map(|_| rng.gen_range(-32768..=32767)).collect();
            assert_eq!(
                run(&eng, &sk, &tree, &features, false),
                tree.evaluate(&features).unwrap(),
                "tree {tree:?} on {features:?}"
            );
        }
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let (eng, sk) = engine(40);
        let tree = Node::reference();
        for features in [[10, 23, 18], [-30, 23, 18], [-30, -20, 18]] {
            assert_eq!(
                run(&eng, &sk, &tree, &features, true),
                run(&eng, &sk, &tree, &features, false)
            );
        }
    }

    #[test]
    fn test_depth_budget_rejected_before_any_operation() {
        let (eng, _) = engine(18);
        let result = DecisionTreeEvaluator::new(&eng, &Node::reference(), EvaluatorOptions::default());
        assert!(matches!(
            result,
            Err(Error::DepthBudget { required: 19, available: 18 })
        ));
        assert_eq!(eng.operations(), 0);
    }

    #[test]
    fn test_leaf_only_tree() {
        let (eng, sk) = engine(0);
        assert_eq!(run(&eng, &sk, &Node::leaf(-7), &[], false), -7);
    }

    #[test]
    fn test_missing_feature() {
        let (eng, _) = engine(19);
        let evaluator =
            DecisionTreeEvaluator::new(&eng, &Node::reference(), EvaluatorOptions::default()).unwrap();
        let before = eng.operations();
        let x = eng.encrypt(&pack_value(1, 16).unwrap()).unwrap();
        assert!(matches!(evaluator.evaluate(&[x]), Err(Error::MissingFeature(1))));
        assert_eq!(eng.operations(), before + 1);
    }

    #[test]
    fn test_out_of_range_tree_rejected() {
        let (eng, _) = engine(40);
        let tree = Node::internal(0, 1 << 20, Node::leaf(0), Node::leaf(1));
        assert!(matches!(
            DecisionTreeEvaluator::new(&eng, &tree, EvaluatorOptions::default()),
            Err(Error::ValueOutOfRange { .. })
        ));
        assert_eq!(eng.operations(), 0);
    }

    #[test]
    fn test_non_power_of_two_slots_rejected_before_any_operation() {
        let (eng, _) = ClearEngine::generate_keypair(ClearParams {
            slots: 48,
            plaintext_modulus: 2,
            depth_budget: 40,
        })
        .unwrap();
        let result = DecisionTreeEvaluator::new(&eng, &Node::reference(), EvaluatorOptions::default());
        assert!(matches!(result, Err(Error::Configuration(_))));
        assert_eq!(eng.operations(), 0);
    }

    #[test]
    fn test_aces_engine_rejects_real_trees() {
        let (eng, _) = AcesEngine::generate_keypair(AcesParams::default()).unwrap();
        let result = DecisionTreeEvaluator::new(&eng, &Node::reference(), EvaluatorOptions::default());
        assert!(matches!(
            result,
            Err(Error::DepthBudget { required: 19, available: 3 })
        ));
        assert_eq!(eng.operations(), 0);
    }
}
