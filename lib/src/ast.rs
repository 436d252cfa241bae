/*!
Syntax tree for the regexp compiler.

The tree is a closed set of node kinds stored in an arena and referenced by
[`NodeId`] handles. Composite kinds exist only before flattening; matching
and assertion leaves survive into the flattened lists consumed by the code
generator. [`NodeKind::Epsilon`] is special: it is synthesized during
flattening to mark structural joins and must never appear in a tree that is
still being indexed.

Allocating every node from one arena, including the ones synthesized while
flattening, makes the arena's drop the single deallocation event for a
compilation.
*/

use bitvec::order::Lsb0;
use bitvec::slice::BitSlice;

/// Index of an automaton state within one compiled expression.
pub(crate) type StateId = u32;

/// Handle to a node in an [`Arena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct NodeId(u32);

impl NodeId {
    #[inline]
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// A set of bytes, represented as a 256-bit bitmap.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ByteClass {
    words: [u64; 4],
}

impl ByteClass {
    pub fn empty() -> Self {
        Self::default()
    }

    #[inline]
    pub fn insert(&mut self, byte: u8) {
        self.words[byte as usize / 64] |= 1 << (byte as usize % 64);
    }

    pub fn insert_range(&mut self, start: u8, end: u8) {
        for byte in start..=end {
            self.insert(byte);
        }
    }

    #[inline]
    pub fn contains(&self, byte: u8) -> bool {
        self.words[byte as usize / 64] & (1 << (byte as usize % 64)) != 0
    }

    /// Returns true if every byte in `other` is also in `self`.
    pub fn contains_all(&self, other: &ByteClass) -> bool {
        self.words
            .iter()
            .zip(other.words.iter())
            .all(|(a, b)| a & b == *b)
    }

    pub fn union_with(&mut self, other: &ByteClass) {
        for (a, b) in self.words.iter_mut().zip(other.words.iter()) {
            *a |= b;
        }
    }

    /// Number of bytes in the class.
    pub fn count(&self) -> u32 {
        self.words.iter().map(|w| w.count_ones()).sum()
    }

    pub fn is_full(&self) -> bool {
        self.words.iter().all(|w| *w == u64::MAX)
    }

    /// Returns an iterator over the bytes contained in the class.
    #[allow(dead_code)]
    pub fn bytes(&self) -> impl Iterator<Item = usize> + '_ {
        BitSlice::<u64, Lsb0>::from_slice(&self.words).iter_ones()
    }
}

/// The closed set of syntax node kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum NodeKind {
    /// Zero-width tree leaf (empty alternation branch, `x{0,n}` expansion).
    /// Lowered to an explicit [`NodeKind::Epsilon`] during flattening.
    Empty,
    /// Children matched one after another.
    Concat(Vec<NodeId>),
    /// One entry state fanned out to every branch, all branch outputs
    /// joined into one state.
    Alternation(Vec<NodeId>),
    /// Zero or more repetitions of the body. The body's output state loops
    /// back to the entry state; the zero-iterations case becomes an epsilon
    /// from entry to output at flattening.
    Repetition(NodeId),
    /// Grouping. Transparent for state assignment.
    Group(NodeId),
    /// A run of literal bytes, length >= 1. Consumes its whole length in
    /// one transition, which is what makes multi-character lookahead
    /// ("time") windows necessary.
    Literal(Box<[u8]>),
    /// Matches any byte. Tests only that the position is in bounds.
    AnyByte,
    /// Matches any byte in the class.
    Class(ByteClass),
    /// Zero-width assertion: start of input or preceded by a newline.
    LineStart,
    /// Zero-width assertion: end of input or followed by a newline.
    LineEnd,
    /// Zero-width structural marker synthesized during flattening.
    Epsilon,
}

impl NodeKind {
    /// Number of input bytes a transition through this node consumes.
    pub fn width(&self) -> usize {
        match self {
            NodeKind::Literal(bytes) => bytes.len(),
            NodeKind::AnyByte | NodeKind::Class(_) => 1,
            _ => 0,
        }
    }

    /// True for leaves that consume input, false for zero-width kinds.
    pub fn is_matching(&self) -> bool {
        self.width() > 0
    }
}

/// A syntax node. The state pair is assigned by the indexer and is only
/// meaningful afterwards.
#[derive(Debug)]
pub(crate) struct Node {
    pub kind: NodeKind,
    pub entry_state: StateId,
    pub output_state: StateId,
}

/// Arena holding every node of one compilation, original and synthesized.
#[derive(Debug, Default)]
pub(crate) struct Arena {
    nodes: Vec<Node>,
}

impl Arena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, kind: NodeKind) -> NodeId {
        self.alloc_with_states(kind, 0, 0)
    }

    pub fn alloc_with_states(
        &mut self,
        kind: NodeKind,
        entry_state: StateId,
        output_state: StateId,
    ) -> NodeId {
        let id = NodeId(self.nodes.len().try_into().unwrap());
        self.nodes.push(Node { kind, entry_state, output_state });
        id
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    #[inline]
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Deep-copies the subtree rooted at `id` into the arena. Used when a
    /// bounded repetition is expanded into multiple copies of its body.
    /// State indices are not copied; the clone is made before indexing.
    pub fn clone_subtree(&mut self, id: NodeId) -> NodeId {
        let kind = match self.node(id).kind.clone() {
            NodeKind::Concat(children) => NodeKind::Concat(
                children.iter().map(|c| self.clone_subtree(*c)).collect(),
            ),
            NodeKind::Alternation(children) => NodeKind::Alternation(
                children.iter().map(|c| self.clone_subtree(*c)).collect(),
            ),
            NodeKind::Repetition(body) => {
                NodeKind::Repetition(self.clone_subtree(body))
            }
            NodeKind::Group(body) => NodeKind::Group(self.clone_subtree(body)),
            leaf => leaf,
        };
        self.alloc(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::{Arena, ByteClass, NodeKind};

    #[test]
    fn byte_class() {
        let mut class = ByteClass::empty();
        class.insert_range(b'a', b'z');
        assert_eq!(class.count(), 26);
        assert!(class.contains(b'q'));
        assert!(!class.contains(b'A'));
        assert!(!class.is_full());

        let mut narrow = ByteClass::empty();
        narrow.insert(b'c');
        assert!(class.contains_all(&narrow));
        assert!(!narrow.contains_all(&class));

        assert_eq!(
            class.bytes().take(3).collect::<Vec<_>>(),
            vec![b'a' as usize, b'b' as usize, b'c' as usize]
        );

        let mut full = ByteClass::empty();
        full.insert_range(0, 255);
        assert!(full.is_full());
    }

    #[test]
    fn clone_subtree() {
        let mut arena = Arena::new();
        let lit = arena.alloc(NodeKind::Literal(Box::from(&b"ab"[..])));
        let rep = arena.alloc(NodeKind::Repetition(lit));
        let copy = arena.clone_subtree(rep);

        assert_ne!(copy, rep);
        match &arena.node(copy).kind {
            NodeKind::Repetition(body) => {
                assert_ne!(*body, lit);
                assert_eq!(arena.node(*body).kind, arena.node(lit).kind);
            }
            kind => panic!("unexpected kind: {:?}", kind),
        }
    }
}
