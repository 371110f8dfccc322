//! Lexicon prefix trie with smeared lookahead scores.
//!
//! Nodes live in an arena and are addressed by [`NodeId`]; the root is always
//! the first node. A child is always created after its parent, so a reverse
//! sweep over the arena visits every subtree before its root.

use crate::error::{Result, TrieError};
use crate::math::log_add;
use serde::{Deserialize, Serialize};

/// Labels kept per node; further labels are dropped.
pub const TRIE_MAX_LABELS: usize = 6;

/// Stable handle to a trie node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub const ROOT: Self = Self(0);

    pub fn index(self) -> usize {
        self.0
    }
}

/// Word ending at a node, with the score used for smearing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Label {
    pub word: usize,
    pub score: f32,
}

/// How label scores are propagated toward the root.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmearingMode {
    /// No lookahead; every node scores 0.
    None,
    /// Best label score in the subtree.
    Max,
    /// Log-sum-exp of all label scores in the subtree.
    LogAdd,
}

#[derive(Clone, Debug)]
pub struct TrieNode {
    token: usize,
    /// Sorted by token index.
    children: Vec<(usize, NodeId)>,
    labels: Vec<Label>,
    max_score: f32,
}

impl TrieNode {
    fn new(token: usize) -> Self {
        Self {
            token,
            children: Vec::new(),
            labels: Vec::new(),
            max_score: 0.0,
        }
    }

    /// Token on the edge leading to this node.
    pub fn token(&self) -> usize {
        self.token
    }

    pub fn child(&self, token: usize) -> Option<NodeId> {
        self.children
            .binary_search_by_key(&token, |&(t, _)| t)
            .ok()
            .map(|i| self.children[i].1)
    }

    /// Children as `(token, node)` pairs in token order.
    pub fn children(&self) -> impl Iterator<Item = (usize, NodeId)> {
        self.children.iter().copied()
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    /// Smeared lookahead score (0 before smearing).
    pub fn max_score(&self) -> f32 {
        self.max_score
    }
}

/// Prefix tree over token index sequences.
#[derive(Clone, Debug)]
pub struct Trie {
    nodes: Vec<TrieNode>,
    max_children: usize,
    smearing: Option<SmearingMode>,
}

impl Trie {
    /// Create an empty trie over `max_children` tokens with the root labeled
    /// by `root_token` (usually the silence token).
    pub fn new(max_children: usize, root_token: usize) -> Self {
        Self {
            nodes: vec![TrieNode::new(root_token)],
            max_children,
            smearing: None,
        }
    }

    pub fn root(&self) -> &TrieNode {
        &self.nodes[0]
    }

    pub fn node(&self, id: NodeId) -> &TrieNode {
        &self.nodes[id.0]
    }

    pub fn child(&self, id: NodeId, token: usize) -> Option<NodeId> {
        self.nodes[id.0].child(token)
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when nothing has been inserted.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1 && self.nodes[0].labels.is_empty()
    }

    pub fn max_children(&self) -> usize {
        self.max_children
    }

    /// Mode of the last smearing pass, `None` if the trie changed since.
    pub fn smearing(&self) -> Option<SmearingMode> {
        self.smearing
    }

    fn check_token(&self, token: usize) -> Result<()> {
        if token >= self.max_children {
            return Err(TrieError::InvalidToken {
                index: token,
                max: self.max_children,
            }
            .into());
        }
        Ok(())
    }

    /// Insert a (packed) spelling and attach `(word, score)` at its end node.
    pub fn insert(&mut self, tokens: &[usize], word: usize, score: f32) -> Result<NodeId> {
        for &token in tokens {
            self.check_token(token)?;
        }

        let mut id = NodeId::ROOT;
        for &token in tokens {
            let node = &self.nodes[id.0];
            id = match node.children.binary_search_by_key(&token, |&(t, _)| t) {
                Ok(i) => node.children[i].1,
                Err(i) => {
                    let child = NodeId(self.nodes.len());
                    self.nodes[id.0].children.insert(i, (token, child));
                    self.nodes.push(TrieNode::new(token));
                    child
                }
            };
        }

        let node = &mut self.nodes[id.0];
        if node.labels.len() < TRIE_MAX_LABELS {
            node.labels.push(Label { word, score });
        } else {
            tracing::warn!(word, limit = TRIE_MAX_LABELS, "trie label limit reached");
        }

        self.smearing = None;
        Ok(id)
    }

    /// Node reached by following `tokens` from the root, if any.
    pub fn search(&self, tokens: &[usize]) -> Result<Option<&TrieNode>> {
        let mut id = NodeId::ROOT;

        for &token in tokens {
            self.check_token(token)?;
            match self.nodes[id.0].child(token) {
                Some(child) => id = child,
                None => return Ok(None),
            }
        }

        Ok(Some(&self.nodes[id.0]))
    }

    /// Propagate label scores bottom-up into every node's `max_score`.
    ///
    /// Recomputes from labels, so repeating it without new insertions gives
    /// the same scores.
    pub fn smear(&mut self, mode: SmearingMode) {
        for i in (0..self.nodes.len()).rev() {
            let node = &self.nodes[i];

            let score = match mode {
                SmearingMode::None => 0.0,
                SmearingMode::Max => node
                    .labels
                    .iter()
                    .map(|l| l.score)
                    .chain(node.children.iter().map(|&(_, c)| self.nodes[c.0].max_score))
                    .fold(f32::NEG_INFINITY, f32::max),
                SmearingMode::LogAdd => node
                    .labels
                    .iter()
                    .map(|l| l.score as f64)
                    .chain(
                        node.children
                            .iter()
                            .map(|&(_, c)| self.nodes[c.0].max_score as f64),
                    )
                    .fold(f64::NEG_INFINITY, log_add) as f32,
            };

            self.nodes[i].max_score = score;
        }

        tracing::debug!(nodes = self.nodes.len(), ?mode, "trie smeared");
        self.smearing = Some(mode);
    }
}
