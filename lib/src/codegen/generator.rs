use log::debug;

use crate::asm::{Assembler, Label, Op, Program, Slot};
use crate::ast::{NodeId, NodeKind, StateId};
use crate::Error;

use super::ff_gen::{Behaviour, FastForwardGen};
use super::{CompileContext, Direction};

/// Upper bound on `time_steps × states_per_time`. Scan frames are stack
/// friendly and compilation refuses expressions whose ring would not be.
const MAX_RING_CELLS: usize = 1 << 20;

/// Match policy of a compiled expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// Stop at the first match: the one completing earliest in the scan,
    /// the leftmost-starting one among matches completing together.
    First,
    /// All non-overlapping matches. A longer match discovered later
    /// supersedes shorter matches it covers.
    All,
    /// The single match spanning from the leftmost start of the
    /// rightmost-ending match, discovered by a forward scan for the end
    /// followed by a backward scan for the start.
    Longest,
}

/// What the generated routine does when the match check fires.
#[derive(Debug, Clone, Copy)]
pub(crate) enum OnMatch {
    /// Record the span unconditionally and stop scanning.
    AppendRawStop,
    /// Record the span through the filtering append and keep scanning for
    /// further or better matches.
    AppendFilterContinue,
    /// Remember the current position as the rightmost match end.
    StoreEnd(Slot),
    /// Remember the current position as the leftmost match start.
    StoreStart(Slot),
}

/// Whether the main loop re-derives initial state at every position or
/// runs from one seeding done by its prologue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Seed {
    EveryPosition,
    Once,
}

/// The code generator: lowers one indexed, flattened expression into the
/// automaton-simulation routine.
///
/// The generated routine's runtime execution follows the state machine
/// `Start → FastForward → Flow(Forward|Backward) → CheckMatch →
/// {FastForward | Unwind/Return}`. All emission goes through the abstract
/// assembler; ring cells are addressed as `(time, state)` operands and the
/// scan direction is folded into operand offsets and advance signs at
/// emission time.
pub(crate) struct Codegen<'a> {
    masm: Assembler,
    ctx: &'a CompileContext,
    match_kind: MatchKind,
    direction: Direction,
    ring_times: usize,
    unwind: Label,
}

impl<'a> Codegen<'a> {
    /// Compiles the context's expression into an executable program.
    pub fn compile(
        ctx: &'a CompileContext,
        match_kind: MatchKind,
    ) -> Result<Program, Error> {
        let mut gen = Self::new(ctx, match_kind)?;
        gen.generate();

        debug!(
            "codegen: {} states, {} ring times, {} ff element(s), {:?}",
            ctx.state_count,
            gen.ring_times,
            ctx.ff_elements.len(),
            match_kind,
        );

        Ok(gen.masm.assemble(gen.ring_times, ctx.state_count as usize))
    }

    /// Compiles a routine that scans backward from the end of the input and
    /// stops at the first match found there: the mirror image of a forward
    /// first-match scan.
    #[cfg(test)]
    pub(crate) fn compile_backward(
        ctx: &'a CompileContext,
    ) -> Result<Program, Error> {
        let mut gen = Self::new(ctx, MatchKind::First)?;
        let unwind = gen.unwind;
        gen.masm.emit(Op::SeekEnd);
        gen.masm.emit(Op::ClearAllTimes);
        gen.set_direction(Direction::Backward);
        gen.generate_match_backward(
            OnMatch::AppendRawStop,
            Seed::EveryPosition,
            unwind,
        );
        gen.masm.bind(unwind);
        gen.masm.emit(Op::Return);
        Ok(gen.masm.assemble(gen.ring_times, ctx.state_count as usize))
    }

    fn new(
        ctx: &'a CompileContext,
        match_kind: MatchKind,
    ) -> Result<Self, Error> {
        let states = ctx.state_count as usize;
        let ring_times = ctx.max_lookahead() + 1;

        if ring_times.saturating_mul(states) > MAX_RING_CELLS {
            return Err(Error::TooLarge);
        }

        let mut masm = Assembler::new();
        let unwind = masm.new_label();

        Ok(Self {
            masm,
            ctx,
            match_kind,
            direction: Direction::Forward,
            ring_times,
            unwind,
        })
    }

    /// Emits the whole routine: early fast-forward, frame setup, the
    /// per-policy main loop(s), and the unwind/return path.
    fn generate(&mut self) {
        let unwind = self.unwind;

        // Start looking for a viable position before setting up the frame.
        // The main loop re-derives entry state, so a plain fall-through is
        // enough here.
        if !self.ctx.ff_elements.is_empty() {
            FastForwardGen::new(&mut self.masm, self.ctx, unwind)
                .generate(Behaviour::FallThrough);
        }

        self.clear_all_times();
        self.set_direction(Direction::Forward);

        match self.match_kind {
            MatchKind::First => {
                self.generate_match_forward(
                    OnMatch::AppendRawStop,
                    Seed::EveryPosition,
                    unwind,
                );
            }
            MatchKind::All => {
                self.generate_match_forward(
                    OnMatch::AppendFilterContinue,
                    Seed::EveryPosition,
                    unwind,
                );
            }
            MatchKind::Longest => {
                let end_slot = self.masm.new_slot();
                let start_slot = self.masm.new_slot();

                // Forward pass: locate the rightmost position where any
                // match ends.
                let backward_entry = self.masm.new_label();
                self.generate_match_forward(
                    OnMatch::StoreEnd(end_slot),
                    Seed::EveryPosition,
                    backward_entry,
                );
                self.masm.bind(backward_entry);
                self.masm.emit(Op::JumpIfSlotUnset {
                    slot: end_slot,
                    target: unwind,
                });

                // Backward pass: from that end, find the leftmost start
                // able to reach it.
                self.set_direction(Direction::Backward);
                self.masm.emit(Op::SeekSlot { slot: end_slot });
                self.clear_all_times();
                let output = self.ctx.output_state();
                self.set_state_force(0, output);

                let done = self.masm.new_label();
                self.generate_match_backward(
                    OnMatch::StoreStart(start_slot),
                    Seed::Once,
                    done,
                );
                self.masm.bind(done);
                self.masm.emit(Op::JumpIfSlotUnset {
                    slot: start_slot,
                    target: unwind,
                });
                self.masm.emit(Op::AppendMatchFromSlots {
                    start: start_slot,
                    end: end_slot,
                    filter: false,
                });
            }
        }

        self.masm.bind(unwind);
        self.masm.emit(Op::Return);
    }

    /// Records the scan direction. Everything direction-dependent that is
    /// resolved at run time (ring-cell preference, span orientation)
    /// follows the emitted switch; everything resolved at emission time
    /// (operand offsets, advance signs, list order) follows the recorded
    /// field.
    pub fn set_direction(&mut self, direction: Direction) {
        self.direction = direction;
        self.masm.emit(Op::SetDirection {
            backwards: direction == Direction::Backward,
        });
    }

    fn generate_match_forward(
        &mut self,
        on_match: OnMatch,
        seed: Seed,
        exit: Label,
    ) {
        self.generate_match_direction(Direction::Forward, on_match, seed, exit)
    }

    fn generate_match_backward(
        &mut self,
        on_match: OnMatch,
        seed: Seed,
        exit: Label,
    ) {
        self.generate_match_direction(Direction::Backward, on_match, seed, exit)
    }

    /// Emits the main scan loop for one direction.
    fn generate_match_direction(
        &mut self,
        direction: Direction,
        on_match: OnMatch,
        seed: Seed,
        exit: Label,
    ) {
        debug_assert_eq!(direction, self.direction);

        let loop_head = self.masm.new_label();

        // Where the loop resumes once the whole automaton has died: the
        // skip loop when there is one, the next position otherwise, or
        // nowhere for a seed-once pass, whose automaton never revives.
        let resume = if direction == Direction::Forward
            && seed == Seed::EveryPosition
            && !self.ctx.ff_elements.is_empty()
        {
            let fast_forward = self.masm.new_label();
            self.masm.bind(fast_forward);
            let behaviour = self.ff_behaviour();
            FastForwardGen::new(&mut self.masm, self.ctx, exit)
                .generate(behaviour);
            fast_forward
        } else if seed == Seed::EveryPosition {
            loop_head
        } else {
            exit
        };

        self.masm.bind(loop_head);

        if seed == Seed::EveryPosition {
            let state = match direction {
                Direction::Forward => self.ctx.entry_state(),
                Direction::Backward => self.ctx.output_state(),
            };
            self.set_state_force(0, state);
        }

        self.handle_control_regexps(direction);
        self.check_match(direction, on_match, exit);
        self.generate_transitions(direction);
        self.advance(1);
        self.flow_time();
        self.check_time_flow(direction, exit, resume, loop_head);
    }

    /// Picks the skip-loop behaviour: seeding the elements' entry states is
    /// only sound when every entry is reachable from the expression entry
    /// through epsilons alone; an element sitting behind an assertion must
    /// not have the assertion bypassed by a forced seed.
    fn ff_behaviour(&self) -> Behaviour {
        let epsilon_reach = self.ctx.zero_width_reachable(true);
        let gated = self.ctx.ff_elements.iter().any(|id| {
            !epsilon_reach[self.ctx.arena.node(*id).entry_state as usize]
        });
        if gated {
            Behaviour::FallThrough
        } else {
            Behaviour::SetStateFallThrough
        }
    }

    /// One ordered pass over the control list, propagating liveness within
    /// time 0. Epsilons propagate unconditionally; assertions gate on their
    /// position condition. The list order follows the flattened traversal,
    /// reversed for backward scans, so chained zero-width joins resolve in
    /// a single pass.
    pub fn handle_control_regexps(&mut self, direction: Direction) {
        let list: Vec<NodeId> = match direction {
            Direction::Forward => self.ctx.control.clone(),
            Direction::Backward => {
                self.ctx.control.iter().rev().copied().collect()
            }
        };
        for id in list {
            self.emit_control(id, direction);
        }
    }

    fn emit_control(&mut self, id: NodeId, direction: Direction) {
        let node = self.ctx.arena.node(id);
        let (source, sink) = match direction {
            Direction::Forward => (node.entry_state, node.output_state),
            Direction::Backward => (node.output_state, node.entry_state),
        };
        let kind = node.kind.clone();

        let skip = self.masm.new_label();
        self.test_state(0, source, skip);

        match kind {
            NodeKind::Epsilon => {}
            NodeKind::LineStart => {
                let holds = self.masm.new_label();
                self.masm.emit(Op::JumpIfAtStart { target: holds });
                self.masm.emit(Op::JumpIfByteEq {
                    offset: -1,
                    byte: b'\n',
                    target: holds,
                });
                self.masm.emit(Op::Jmp { target: skip });
                self.masm.bind(holds);
            }
            NodeKind::LineEnd => {
                let holds = self.masm.new_label();
                self.masm.emit(Op::JumpIfAtEnd { target: holds });
                self.masm.emit(Op::JumpIfByteEq {
                    offset: 0,
                    byte: b'\n',
                    target: holds,
                });
                self.masm.emit(Op::Jmp { target: skip });
                self.masm.bind(holds);
            }
            kind => unreachable!("matching node in the control list: {:?}", kind),
        }

        self.set_state(0, sink, source);
        self.masm.bind(skip);
    }

    /// Emits the transition code of every matching node, in list order: if
    /// the source state is live at time 0 and the node's condition holds at
    /// the cursor, liveness propagates to the sink state at the node's
    /// width.
    pub fn generate_transitions(&mut self, direction: Direction) {
        let list = self.ctx.matching.clone();
        for id in list {
            self.emit_transition(id, direction);
        }
    }

    fn emit_transition(&mut self, id: NodeId, direction: Direction) {
        let node = self.ctx.arena.node(id);
        let (source, sink) = match direction {
            Direction::Forward => (node.entry_state, node.output_state),
            Direction::Backward => (node.output_state, node.entry_state),
        };
        let kind = node.kind.clone();
        let width = kind.width();

        let skip = self.masm.new_label();
        self.test_state(0, source, skip);

        match kind {
            NodeKind::Literal(bytes) => {
                let len = bytes.len() as i32;
                for (i, byte) in bytes.iter().enumerate() {
                    let offset = match direction {
                        Direction::Forward => i as i32,
                        Direction::Backward => i as i32 - len,
                    };
                    self.masm.emit(Op::JumpIfByteNe {
                        offset,
                        byte: *byte,
                        target: skip,
                    });
                }
            }
            NodeKind::AnyByte => {
                self.masm.emit(Op::JumpIfOob {
                    offset: self.element_offset(direction),
                    target: skip,
                });
            }
            NodeKind::Class(class) => {
                let class = self.masm.intern_class(&class);
                self.masm.emit(Op::JumpIfNotInClass {
                    offset: self.element_offset(direction),
                    class,
                    target: skip,
                });
            }
            kind => {
                unreachable!("control node in the matching list: {:?}", kind)
            }
        }

        self.set_state(width, sink, source);
        self.masm.bind(skip);
    }

    /// Offset of the single element a one-wide node consumes: the byte at
    /// the cursor going forward, the byte before it going backward.
    fn element_offset(&self, direction: Direction) -> i32 {
        match direction {
            Direction::Forward => 0,
            Direction::Backward => -1,
        }
    }

    /// Evaluates whether the active policy's match condition holds at the
    /// current position and registers the match if so. Forward scans match
    /// when the expression's output state is live at time 0; backward scans
    /// when the entry state is.
    pub fn check_match(
        &mut self,
        direction: Direction,
        on_match: OnMatch,
        exit: Label,
    ) {
        let match_state = match direction {
            Direction::Forward => self.ctx.output_state(),
            Direction::Backward => self.ctx.entry_state(),
        };
        let skip = self.masm.new_label();
        self.test_state(0, match_state, skip);
        self.register_match(on_match, match_state, exit);
        self.masm.bind(skip);
    }

    /// Commits a match according to the policy and decides whether the scan
    /// stops or keeps looking for further or better matches.
    fn register_match(
        &mut self,
        on_match: OnMatch,
        match_state: StateId,
        exit: Label,
    ) {
        match on_match {
            OnMatch::AppendRawStop => {
                self.masm.emit(Op::AppendMatch {
                    state: match_state,
                    filter: false,
                });
                self.masm.emit(Op::Jmp { target: exit });
            }
            OnMatch::AppendFilterContinue => {
                self.masm.emit(Op::AppendMatch {
                    state: match_state,
                    filter: true,
                });
            }
            OnMatch::StoreEnd(slot) | OnMatch::StoreStart(slot) => {
                self.masm.emit(Op::StorePos { slot });
            }
        }
    }

    /// Bounds-checked `(time, state)` ring-cell operand.
    fn state_operand(&self, time: usize, state: StateId) -> (u16, u32) {
        assert!(time < self.ring_times, "time beyond the state ring");
        assert!(state < self.ctx.state_count, "state beyond the ring row");
        (time as u16, state)
    }

    /// Emits a branch to `on_dead` unless `(time, state)` is live.
    pub fn test_state(&mut self, time: usize, state: StateId, on_dead: Label) {
        let (time, state) = self.state_operand(time, state);
        self.masm.emit(Op::JumpIfStateDead { time, state, target: on_dead });
    }

    /// Propagates the match origin held by the source state at time 0 to
    /// `(time, state)`.
    pub fn set_state(&mut self, time: usize, state: StateId, from: StateId) {
        let (time, state) = self.state_operand(time, state);
        self.masm.emit(Op::SetState { time, state, from });
    }

    /// Makes `(time, state)` live with the current position as the match
    /// origin: how a scan records where a potential match began without
    /// recomputing it on match.
    pub fn set_state_force(&mut self, time: usize, state: StateId) {
        let (time, state) = self.state_operand(time, state);
        self.masm.emit(Op::SetStateForce { time, state });
    }

    pub fn clear_time(&mut self, time: usize) {
        let (time, _) = self.state_operand(time, 0);
        self.masm.emit(Op::ClearTime { time });
    }

    pub fn clear_all_times(&mut self) {
        self.masm.emit(Op::ClearAllTimes);
    }

    /// Moves the cursor `n` elements along the scan direction.
    pub fn advance(&mut self, n: usize) {
        let n = n as i32;
        let n = match self.direction {
            Direction::Forward => n,
            Direction::Backward => -n,
        };
        self.masm.emit(Op::Advance { n });
    }

    /// Rotates the ring one time slot: the expiring slot is cleared and
    /// recycled as the farthest lookahead slot.
    pub fn flow_time(&mut self) {
        self.clear_time(0);
        self.masm.emit(Op::NextTime);
    }

    /// Emits the automaton-death test: branch to `limit` when no time slot
    /// has any live state.
    pub fn test_time_flow(&mut self, limit: Label) {
        self.masm.emit(Op::JumpIfNoLiveTimes { target: limit });
    }

    /// The loop tail: leave through `exit` when the input is exhausted,
    /// abandon the attempt through `limit` when the automaton has died,
    /// keep flowing otherwise.
    pub fn check_time_flow(
        &mut self,
        direction: Direction,
        exit: Label,
        limit: Label,
        loop_head: Label,
    ) {
        debug_assert_eq!(direction, self.direction);
        self.masm.emit(Op::JumpIfCursorOut { target: exit });
        self.test_time_flow(limit);
        self.masm.emit(Op::Jmp { target: loop_head });
    }
}
