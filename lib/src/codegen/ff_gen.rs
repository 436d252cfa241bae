use crate::asm::{Assembler, Label, Op};
use crate::ast::{NodeId, NodeKind, StateId};

use super::CompileContext;

/// What the skip loop does once some element matches at the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Behaviour {
    /// Seed the entry states of the matched elements, then fall through
    /// into the main loop: the fast-forward hit becomes initial ring state.
    SetStateFallThrough,
    /// Simply fall through. Used when the main loop re-derives entry state
    /// itself, e.g. during the early fast-forward emitted before the frame
    /// is set up.
    FallThrough,
}

/// Emits the fast-forward skip loop: advance the cursor until one of the
/// selected elements matches or the input is exhausted. Exhaustion branches
/// to the unwind path; a hit falls through.
pub(crate) struct FastForwardGen<'m, 'c> {
    masm: &'m mut Assembler,
    ctx: &'c CompileContext,
    exhausted: Label,
}

impl<'m, 'c> FastForwardGen<'m, 'c> {
    pub fn new(
        masm: &'m mut Assembler,
        ctx: &'c CompileContext,
        exhausted: Label,
    ) -> Self {
        Self { masm, ctx, exhausted }
    }

    pub fn generate(&mut self, behaviour: Behaviour) {
        debug_assert!(!self.ctx.ff_elements.is_empty());

        // A single literal element reduces to the backend's byte-skip
        // primitive.
        let single_byte = match self.ctx.ff_elements.as_slice() {
            [only] => match &self.ctx.arena.node(*only).kind {
                NodeKind::Literal(bytes) => Some(bytes[0]),
                _ => None,
            },
            _ => None,
        };

        match single_byte {
            Some(byte) => {
                self.masm.emit(Op::SkipToByte {
                    byte,
                    target: self.exhausted,
                });
            }
            None => {
                let head = self.masm.new_label();
                let hit = self.masm.new_label();
                self.masm.bind(head);
                self.masm.emit(Op::JumpIfAtEnd { target: self.exhausted });
                for id in self.ctx.ff_elements.clone() {
                    self.visit_single(id, hit);
                }
                self.masm.emit(Op::Advance { n: 1 });
                self.masm.emit(Op::Jmp { target: head });
                self.masm.bind(hit);
            }
        }

        if behaviour == Behaviour::SetStateFallThrough {
            self.set_entry_states();
        }
    }

    /// Emits a standalone boolean probe for one element, jumping to `hit`
    /// when it passes. Mirrors the leaf dispatch of the code generator but
    /// tests a single position instead of emitting a state transition; a
    /// literal run is probed by its first byte, the main loop verifies the
    /// rest.
    fn visit_single(&mut self, id: NodeId, hit: Label) {
        match &self.ctx.arena.node(id).kind {
            NodeKind::Literal(bytes) => {
                self.masm.emit(Op::JumpIfByteEq {
                    offset: 0,
                    byte: bytes[0],
                    target: hit,
                });
            }
            NodeKind::Class(class) => {
                let class = self.masm.intern_class(class);
                self.masm.emit(Op::JumpIfInClass {
                    offset: 0,
                    class,
                    target: hit,
                });
            }
            kind => unreachable!("bad fast-forward element: {:?}", kind),
        }
    }

    /// Seeds the entry states of every element with the cursor as the match
    /// origin, turning the hit into initial automaton state.
    fn set_entry_states(&mut self) {
        let mut seeded: Vec<StateId> = Vec::new();
        for id in self.ctx.ff_elements.iter() {
            let entry = self.ctx.arena.node(*id).entry_state;
            if !seeded.contains(&entry) {
                seeded.push(entry);
                self.masm.emit(Op::SetStateForce { time: 0, state: entry });
            }
        }
    }
}
