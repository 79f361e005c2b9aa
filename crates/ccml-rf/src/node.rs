use std::fmt;

/// Zero-based feature column index.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
    serde::Serialize, serde::Deserialize,
)]
pub struct FeatureIndex(usize);

impl FeatureIndex {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Return the zero-based feature column index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for FeatureIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "f{}", self.0)
    }
}

/// Position of a node inside a tree's node arena.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
    serde::Serialize, serde::Deserialize,
)]
pub struct NodeIndex(usize);

impl NodeIndex {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Return the zero-based arena index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A node in a decision tree arena.
///
/// Children are referenced by [`NodeIndex`] so a whole tree is one flat
/// `Vec<Node>` that serializes without any pointer fix-up. The root is
/// always at index 0.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Node {
    /// Interior node: `sample[feature] <= threshold` goes left.
    Split {
        /// Feature tested at this node.
        feature: FeatureIndex,
        /// Decision threshold.
        threshold: f64,
        /// Left child.
        left: NodeIndex,
        /// Right child.
        right: NodeIndex,
        /// Training samples that reached this node.
        n_samples: usize,
        /// Weighted impurity decrease contributed by this split.
        impurity_decrease: f64,
    },
    /// Terminal node holding the class frequencies of its training samples.
    Leaf {
        /// Class probabilities, one entry per class, summing to 1.0.
        distribution: Vec<f64>,
        /// Training samples that reached this leaf.
        n_samples: usize,
    },
}

impl Node {
    /// Return the number of training samples that reached this node.
    #[must_use]
    pub fn n_samples(&self) -> usize {
        match self {
            Node::Split { n_samples, .. } | Node::Leaf { n_samples, .. } => *n_samples,
        }
    }

    /// Return `true` if this node is a leaf.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::{FeatureIndex, Node, NodeIndex};

    #[test]
    fn feature_index_display_is_prefixed() {
        assert_eq!(FeatureIndex::new(3).to_string(), "f3");
        assert_eq!(FeatureIndex::new(3).index(), 3);
    }

    #[test]
    fn node_index_display_and_ordering() {
        assert_eq!(NodeIndex::new(0).to_string(), "#0");
        assert!(NodeIndex::new(1) < NodeIndex::new(4));
    }

    #[test]
    fn leaf_and_split_sample_counts() {
        let leaf = Node::Leaf {
            distribution: vec![0.25, 0.75],
            n_samples: 4,
        };
        let split = Node::Split {
            feature: FeatureIndex::new(0),
            threshold: 1.5,
            left: NodeIndex::new(1),
            right: NodeIndex::new(2),
            n_samples: 9,
            impurity_decrease: 0.4,
        };
        assert!(leaf.is_leaf());
        assert!(!split.is_leaf());
        assert_eq!(leaf.n_samples(), 4);
        assert_eq!(split.n_samples(), 9);
    }
}
