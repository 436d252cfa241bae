use crate::ast::{NodeId, NodeKind};

use super::CompileContext;

/// Flattens the indexed tree into the matching and control lists.
///
/// Children are visited in fixed order (left-to-right for sequences, branch
/// order for alternations, body for repetitions), so the lists carry the
/// flattened traversal order. Joins that the tree encoded structurally but
/// shared state indices cannot express become explicit epsilon markers,
/// synthesized into the context's arena.
pub(crate) struct Lister<'a> {
    ctx: &'a mut CompileContext,
}

impl<'a> Lister<'a> {
    pub fn new(ctx: &'a mut CompileContext) -> Self {
        Self { ctx }
    }

    pub fn list_tree(&mut self) {
        let root = self.ctx.root;
        self.visit(root);
    }

    fn visit(&mut self, node: NodeId) {
        let kind = self.ctx.arena.node(node).kind.clone();
        match kind {
            NodeKind::Concat(children) if children.is_empty() => {
                // An empty sequence is a pure join between its entry and
                // output states.
                self.list_new_epsilon(node);
            }
            NodeKind::Concat(children) | NodeKind::Alternation(children) => {
                for child in children {
                    self.visit(child);
                }
            }
            NodeKind::Repetition(body) => {
                self.visit(body);
                // The zero-iterations path: entry flows to output without
                // consuming input.
                self.list_new_epsilon(node);
            }
            NodeKind::Group(body) => self.visit(body),
            NodeKind::Empty => self.list_new_epsilon(node),
            NodeKind::Literal(_)
            | NodeKind::AnyByte
            | NodeKind::Class(_)
            | NodeKind::LineStart
            | NodeKind::LineEnd => self.list(node),
            NodeKind::Epsilon => {
                unreachable!("epsilon node in the unflattened tree")
            }
        }
    }

    /// Appends a leaf to the matching list if it consumes input, to the
    /// control list otherwise.
    fn list(&mut self, node: NodeId) {
        if self.ctx.arena.node(node).kind.is_matching() {
            self.ctx.matching.push(node);
        } else {
            self.ctx.control.push(node);
        }
    }

    /// Synthesizes a node, registers it with the context's arena, and lists
    /// it.
    fn list_new(&mut self, kind: NodeKind, source: NodeId) -> NodeId {
        let entry = self.ctx.arena.node(source).entry_state;
        let output = self.ctx.arena.node(source).output_state;
        let id = self.ctx.arena.alloc_with_states(kind, entry, output);
        self.list(id);
        id
    }

    /// Synthesizes an epsilon marker carrying `source`'s state pair.
    fn list_new_epsilon(&mut self, source: NodeId) {
        self.list_new(NodeKind::Epsilon, source);
    }
}
