//! Incremental Merkle Tree over commitment hashes
//!
//! Fixed-depth, append-only tree mirroring the on-chain commitment tree.
//! Every level is kept as one flat buffer; missing right siblings are read
//! from the precomputed `zeros` table.
//!
//! ```text
//!                    Root                       layers[levels]
//!                   /    \
//!                 H01    H23                    layers[1]
//!                /  \   /   \
//!               C0  C1 C2   zeros[0]            layers[0] (leaves)
//! ```
//!
//! `Hash2` is the same Poseidon used by the circuits, which recompute the
//! root from a [`MerklePath`].

use tracing::trace;

use crate::error::{Result, ShieldedError};
use crate::field::FieldElement;
use crate::hash::{default_zero_element, hash2};

/// Deepest tree accepted by [`MerkleTree::new`]
pub const MAX_LEVELS: usize = 32;

/// A membership path, leaf to root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerklePath {
    /// Sibling at each level, bottom first
    pub path_elements: Vec<FieldElement>,
    /// `true` when the node at that level is a right child
    pub path_indices: Vec<bool>,
}

impl MerklePath {
    /// Fold `leaf` up the path the same way the circuit does
    pub fn compute_root(&self, leaf: FieldElement) -> FieldElement {
        self.path_elements
            .iter()
            .zip(&self.path_indices)
            .fold(leaf, |current, (sibling, is_right)| {
                if *is_right {
                    hash2(*sibling, current)
                } else {
                    hash2(current, *sibling)
                }
            })
    }

    /// Check that this path proves inclusion of `leaf` under `root`
    pub fn verify(&self, leaf: FieldElement, root: FieldElement) -> bool {
        self.compute_root(leaf) == root
    }

    /// Path indices packed as `Σ bit_i << i`, i.e. the leaf index
    pub fn encoded_indices(&self) -> u64 {
        self.path_indices
            .iter()
            .enumerate()
            .fold(0u64, |acc, (i, bit)| acc | (u64::from(*bit) << i))
    }

    /// Drop the bottom `levels` entries (the path of the enclosing subtree)
    pub fn above(&self, levels: usize) -> MerklePath {
        MerklePath {
            path_elements: self.path_elements.iter().skip(levels).copied().collect(),
            path_indices: self.path_indices.iter().skip(levels).copied().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.path_elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.path_elements.is_empty()
    }
}

/// A leaf accepted by the ledger, in acceptance order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeafEvent {
    pub leaf: FieldElement,
    pub index: usize,
    pub amount: FieldElement,
}

/// Append-only Merkle tree with one flat buffer per level
///
/// Not synchronized: mutations must be serialized by the owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleTree {
    levels: usize,
    capacity: usize,
    zero_element: FieldElement,
    /// `zeros[i]` is the root of an empty subtree of height `i`
    zeros: Vec<FieldElement>,
    layers: Vec<Vec<FieldElement>>,
}

impl MerkleTree {
    /// Build a tree of depth `levels` from `elements`
    ///
    /// Uses [`default_zero_element`] when `zero_element` is `None`.
    pub fn new(
        levels: usize,
        elements: &[FieldElement],
        zero_element: Option<FieldElement>,
    ) -> Result<Self> {
        if levels == 0 || levels > MAX_LEVELS {
            return Err(ShieldedError::InvalidTreeDepth(levels));
        }
        let capacity = 1usize
            .checked_shl(levels as u32)
            .ok_or(ShieldedError::InvalidTreeDepth(levels))?;
        if elements.len() > capacity {
            return Err(ShieldedError::TreeCapacityExceeded {
                capacity,
                requested: elements.len(),
            });
        }

        let zero_element = zero_element.unwrap_or_else(default_zero_element);
        let mut zeros = Vec::with_capacity(levels + 1);
        zeros.push(zero_element);
        for i in 1..=levels {
            zeros.push(hash2(zeros[i - 1], zeros[i - 1]));
        }

        let mut layers = vec![Vec::new(); levels + 1];
        layers[0] = elements.to_vec();

        let mut tree = Self {
            levels,
            capacity,
            zero_element,
            zeros,
            layers,
        };
        tree.rebuild();
        Ok(tree)
    }

    /// Empty tree with the protocol zero element
    pub fn empty(levels: usize) -> Result<Self> {
        Self::new(levels, &[], None)
    }

    fn rebuild(&mut self) {
        for level in 1..=self.levels {
            let below = &self.layers[level - 1];
            let zero = self.zeros[level - 1];
            let parents = below
                .chunks(2)
                .map(|pair| hash2(pair[0], pair.get(1).copied().unwrap_or(zero)))
                .collect();
            self.layers[level] = parents;
        }
    }

    pub fn levels(&self) -> usize {
        self.levels
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn zero_element(&self) -> FieldElement {
        self.zero_element
    }

    pub fn zeros(&self) -> &[FieldElement] {
        &self.zeros
    }

    /// Current root, or `zeros[levels]` when empty
    pub fn root(&self) -> FieldElement {
        self.layers[self.levels]
            .first()
            .copied()
            .unwrap_or(self.zeros[self.levels])
    }

    /// Leaves in insertion order
    pub fn elements(&self) -> &[FieldElement] {
        &self.layers[0]
    }

    pub fn len(&self) -> usize {
        self.layers[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers[0].is_empty()
    }

    /// Append one leaf
    pub fn insert(&mut self, element: FieldElement) -> Result<usize> {
        let index = self.len();
        if index >= self.capacity {
            return Err(ShieldedError::TreeCapacityExceeded {
                capacity: self.capacity,
                requested: index + 1,
            });
        }
        self.update(index, element)?;
        Ok(index)
    }

    /// Append a batch of leaves
    ///
    /// Same result as inserting one by one. Intermediate nodes are only
    /// recomputed once their right child arrives; the last leaf walks the
    /// full path so every ancestor is current.
    pub fn bulk_insert(&mut self, elements: &[FieldElement]) -> Result<()> {
        let Some((last, rest)) = elements.split_last() else {
            return Ok(());
        };
        let requested = self.len() + elements.len();
        if requested > self.capacity {
            return Err(ShieldedError::TreeCapacityExceeded {
                capacity: self.capacity,
                requested,
            });
        }

        for element in rest {
            self.layers[0].push(*element);
            let mut level = 0;
            let mut index = self.layers[0].len() - 1;
            while index % 2 == 1 {
                level += 1;
                index >>= 1;
                let below = &self.layers[level - 1];
                let node = hash2(below[index * 2], below[index * 2 + 1]);
                set_or_push(&mut self.layers[level], index, node);
            }
        }

        self.update(self.len(), *last)
    }

    /// Set the leaf at `index` (at most one past the end) and recompute its path
    pub fn update(&mut self, index: usize, element: FieldElement) -> Result<()> {
        let len = self.len();
        if index > len || index >= self.capacity {
            return Err(ShieldedError::IndexOutOfBounds { index, len });
        }

        set_or_push(&mut self.layers[0], index, element);
        let mut index = index;
        for level in 1..=self.levels {
            index >>= 1;
            let below = &self.layers[level - 1];
            let left = below[index * 2];
            let right = below
                .get(index * 2 + 1)
                .copied()
                .unwrap_or(self.zeros[level - 1]);
            let node = hash2(left, right);
            set_or_push(&mut self.layers[level], index, node);
        }
        Ok(())
    }

    /// Membership path of the leaf at `index`
    pub fn path(&self, index: usize) -> Result<MerklePath> {
        let len = self.len();
        if index >= len {
            return Err(ShieldedError::LeafNotFound { index, len });
        }

        let mut path_elements = Vec::with_capacity(self.levels);
        let mut path_indices = Vec::with_capacity(self.levels);
        let mut index = index;
        for level in 0..self.levels {
            path_indices.push(index & 1 == 1);
            let sibling = self.layers[level]
                .get(index ^ 1)
                .copied()
                .unwrap_or(self.zeros[level]);
            path_elements.push(sibling);
            index >>= 1;
        }

        Ok(MerklePath {
            path_elements,
            path_indices,
        })
    }

    pub fn index_of(&self, element: &FieldElement) -> Option<usize> {
        self.layers[0].iter().position(|e| e == element)
    }

    /// Linear search with a caller-supplied equality
    pub fn index_of_by<F>(&self, element: &FieldElement, eq: F) -> Option<usize>
    where
        F: Fn(&FieldElement, &FieldElement) -> bool,
    {
        self.layers[0].iter().position(|e| eq(element, e))
    }

    /// Mirror ledger events into the tree
    ///
    /// Event indices must continue the current leaf count without gaps or
    /// repeats. The whole batch is checked before anything is inserted.
    pub fn apply_events(&mut self, events: &[LeafEvent]) -> Result<usize> {
        let start = self.len();
        for (offset, event) in events.iter().enumerate() {
            let expected = start + offset;
            if event.index != expected {
                return Err(ShieldedError::LeafOutOfOrder {
                    expected,
                    got: event.index,
                });
            }
        }

        let leaves: Vec<FieldElement> = events.iter().map(|e| e.leaf).collect();
        self.bulk_insert(&leaves)?;
        trace!(applied = events.len(), len = self.len(), "mirrored leaf events");
        Ok(events.len())
    }
}

fn set_or_push(layer: &mut Vec<FieldElement>, index: usize, value: FieldElement) {
    debug_assert!(index <= layer.len(), "layer index skips a node");
    if index < layer.len() {
        layer[index] = value;
    } else {
        layer.push(value);
    }
}
