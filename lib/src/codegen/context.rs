use crate::ast::{Arena, NodeId, NodeKind, StateId};

/// Per-expression compilation state, owned for the whole pipeline run.
///
/// The matching and control lists are filled by the lister in flattened
/// traversal order; that order defines state-propagation and code-emission
/// order and must not be disturbed. Every listed node has valid state
/// indices before the code generator runs.
pub(crate) struct CompileContext {
    pub arena: Arena,
    pub root: NodeId,
    /// Leaves that consume input, in flattened order.
    pub matching: Vec<NodeId>,
    /// Zero-width nodes (assertions and epsilons), in flattened order.
    pub control: Vec<NodeId>,
    /// Elements selected for the fast-forward prefilter. May be empty, in
    /// which case the scan steps the full automaton from every position.
    pub ff_elements: Vec<NodeId>,
    /// Total number of automaton states assigned by the indexer.
    pub state_count: u32,
}

impl CompileContext {
    pub fn new(arena: Arena, root: NodeId) -> Self {
        Self {
            arena,
            root,
            matching: Vec::new(),
            control: Vec::new(),
            ff_elements: Vec::new(),
            state_count: 0,
        }
    }

    /// Entry state of the whole expression.
    pub fn entry_state(&self) -> StateId {
        self.arena.node(self.root).entry_state
    }

    /// Output state of the whole expression; a match has occurred when it
    /// becomes live at time 0.
    pub fn output_state(&self) -> StateId {
        self.arena.node(self.root).output_state
    }

    /// The deepest lookahead any matching leaf requires: a literal run of
    /// length k resolves k characters ahead. Zero when the expression has
    /// no matching leaves at all.
    pub fn max_lookahead(&self) -> usize {
        self.matching
            .iter()
            .map(|id| self.arena.node(*id).kind.width())
            .max()
            .unwrap_or(0)
    }

    /// Computes which states are reachable from the entry state consuming
    /// no input, by propagating over the control list until a fixed point.
    ///
    /// With `epsilon_only` the closure follows only epsilon markers; the
    /// full closure also flows through assertions, optimistically assuming
    /// their position condition could hold.
    pub fn zero_width_reachable(&self, epsilon_only: bool) -> Vec<bool> {
        let mut reachable = vec![false; self.state_count as usize];
        reachable[self.entry_state() as usize] = true;

        let mut changed = true;
        while changed {
            changed = false;
            for id in self.control.iter() {
                let node = self.arena.node(*id);
                if epsilon_only && node.kind != NodeKind::Epsilon {
                    continue;
                }
                if reachable[node.entry_state as usize]
                    && !reachable[node.output_state as usize]
                {
                    reachable[node.output_state as usize] = true;
                    changed = true;
                }
            }
        }

        reachable
    }
}
