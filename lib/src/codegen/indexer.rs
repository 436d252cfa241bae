use crate::ast::{NodeId, NodeKind, StateId};

use super::CompileContext;

/// Walks the tree and assigns entry and output state indices to every node.
///
/// Composite kinds redistribute their pair to their children according to
/// their semantics: a sequence chains each child's output into the next
/// child's entry, an alternation fans one entry out to every branch and
/// joins every branch output into one state, a repetition loops its body's
/// output back to its own entry. Leaves terminate the recursion by
/// recording the pair.
pub(crate) struct Indexer<'a> {
    ctx: &'a mut CompileContext,
}

impl<'a> Indexer<'a> {
    pub fn new(ctx: &'a mut CompileContext) -> Self {
        Self { ctx }
    }

    /// Indexes the whole tree from state 0, allocating a fresh output state
    /// for the root.
    pub fn index(&mut self) {
        debug_assert_eq!(self.ctx.state_count, 0);
        // State 0 is the expression's entry state.
        self.ctx.state_count = 1;
        let root = self.ctx.root;
        self.index_sub(root, 0, None);
    }

    fn next_state(&mut self) -> StateId {
        let state = self.ctx.state_count;
        self.ctx.state_count += 1;
        state
    }

    /// Assigns `entry` and `output` to the subtree rooted at `node`.
    /// `None` as output means "allocate a fresh state". Returns the
    /// resolved output state.
    pub fn index_sub(
        &mut self,
        node: NodeId,
        entry: StateId,
        output: Option<StateId>,
    ) -> StateId {
        let kind = self.ctx.arena.node(node).kind.clone();
        let output = match kind {
            NodeKind::Concat(children) if children.is_empty() => {
                self.resolve(output)
            }
            NodeKind::Concat(children) => {
                let mut cursor = entry;
                let last = children.len() - 1;
                for child in &children[..last] {
                    cursor = self.index_sub(*child, cursor, None);
                }
                self.index_sub(children[last], cursor, output)
            }
            NodeKind::Alternation(children) => {
                let output = self.resolve(output);
                for child in children {
                    self.index_sub(child, entry, Some(output));
                }
                output
            }
            NodeKind::Repetition(body) => {
                let output = self.resolve(output);
                // The body's output is the repetition's own entry, closing
                // the loop. The zero-iterations path becomes an epsilon
                // from entry to output when the tree is flattened.
                self.index_sub(body, entry, Some(entry));
                output
            }
            NodeKind::Group(body) => self.index_sub(body, entry, output),
            NodeKind::Empty
            | NodeKind::Literal(_)
            | NodeKind::AnyByte
            | NodeKind::Class(_)
            | NodeKind::LineStart
            | NodeKind::LineEnd => self.resolve(output),
            // Epsilon markers are generated by the lister and must not
            // exist before that stage.
            NodeKind::Epsilon => {
                unreachable!("epsilon node reached the indexer")
            }
        };

        let n = self.ctx.arena.node_mut(node);
        n.entry_state = entry;
        n.output_state = output;
        output
    }

    fn resolve(&mut self, output: Option<StateId>) -> StateId {
        match output {
            Some(state) => state,
            None => self.next_state(),
        }
    }
}
