use std::fmt::{Display, Formatter};

use bitvec::vec::BitVec;

use crate::ast::ByteClass;
use crate::matches::{Match, MatchSink};

use super::assembler::{ClassId, Label, Op};

/// Marker for a dead state-ring cell.
const DEAD: usize = usize::MAX;

/// The opaque executable handle produced by assembling generated code.
///
/// A `Program` is immutable once assembled. [`Program::scan`] owns no state
/// across calls: the state ring, time summary and frame slots live in the
/// call's activation, so concurrent scans of one program from different
/// threads are independent as long as each call writes into its own sink.
pub struct Program {
    ops: Vec<Op>,
    labels: Vec<usize>,
    classes: Vec<ByteClass>,
    ring_times: usize,
    state_count: usize,
    slot_count: usize,
}

impl Program {
    pub(crate) fn new(
        ops: Vec<Op>,
        labels: Vec<usize>,
        classes: Vec<ByteClass>,
        ring_times: usize,
        state_count: usize,
        slot_count: usize,
    ) -> Self {
        Self { ops, labels, classes, ring_times, state_count, slot_count }
    }

    #[inline]
    pub(crate) fn target(&self, label: Label) -> usize {
        self.labels[label.0 as usize]
    }

    #[inline]
    fn class(&self, id: ClassId) -> &ByteClass {
        &self.classes[id.0 as usize]
    }

    #[cfg(test)]
    pub(crate) fn ops(&self) -> &[Op] {
        &self.ops
    }

    #[cfg(test)]
    pub(crate) fn ring_times(&self) -> usize {
        self.ring_times
    }

    /// Scans `input` from start to finish, reporting match spans into
    /// `sink` as the routine discovers them.
    pub fn scan(&self, input: &[u8], sink: &mut dyn MatchSink) {
        let len = input.len() as isize;
        let mut ring = StateRing::new(self.ring_times, self.state_count);
        let mut slots: Vec<Option<usize>> = vec![None; self.slot_count];
        let mut cursor: isize = 0;
        let mut backwards = false;
        let mut pc = 0;

        while let Some(op) = self.ops.get(pc) {
            pc += 1;
            match op {
                Op::Jmp { target } => pc = self.target(*target),
                Op::JumpIfByteEq { offset, byte, target } => {
                    if byte_at(input, cursor, *offset) == Some(*byte) {
                        pc = self.target(*target);
                    }
                }
                Op::JumpIfByteNe { offset, byte, target } => {
                    if byte_at(input, cursor, *offset) != Some(*byte) {
                        pc = self.target(*target);
                    }
                }
                Op::JumpIfInClass { offset, class, target } => {
                    if let Some(byte) = byte_at(input, cursor, *offset) {
                        if self.class(*class).contains(byte) {
                            pc = self.target(*target);
                        }
                    }
                }
                Op::JumpIfNotInClass { offset, class, target } => {
                    match byte_at(input, cursor, *offset) {
                        Some(byte) if self.class(*class).contains(byte) => {}
                        _ => pc = self.target(*target),
                    }
                }
                Op::JumpIfOob { offset, target } => {
                    if byte_at(input, cursor, *offset).is_none() {
                        pc = self.target(*target);
                    }
                }
                Op::JumpIfAtStart { target } => {
                    if cursor == 0 {
                        pc = self.target(*target);
                    }
                }
                Op::JumpIfAtEnd { target } => {
                    if cursor == len {
                        pc = self.target(*target);
                    }
                }
                Op::JumpIfCursorOut { target } => {
                    if cursor < 0 || cursor > len {
                        pc = self.target(*target);
                    }
                }
                Op::SkipToByte { byte, target } => {
                    let from = cursor.max(0) as usize;
                    match input.get(from..).and_then(|tail| {
                        memchr::memchr(*byte, tail)
                    }) {
                        Some(found) => cursor = (from + found) as isize,
                        None => pc = self.target(*target),
                    }
                }
                Op::Advance { n } => cursor += *n as isize,
                Op::SetDirection { backwards: b } => backwards = *b,
                Op::SetState { time, state, from } => {
                    let origin = ring.get(0, *from as usize);
                    if origin != DEAD {
                        ring.set(
                            *time as usize,
                            *state as usize,
                            origin,
                            backwards,
                        );
                    }
                }
                Op::SetStateForce { time, state } => {
                    ring.set(
                        *time as usize,
                        *state as usize,
                        cursor as usize,
                        backwards,
                    );
                }
                Op::JumpIfStateDead { time, state, target } => {
                    if ring.get(*time as usize, *state as usize) == DEAD {
                        pc = self.target(*target);
                    }
                }
                Op::ClearTime { time } => ring.clear_time(*time as usize),
                Op::ClearAllTimes => ring.clear_all(),
                Op::NextTime => ring.rotate(),
                Op::JumpIfNoLiveTimes { target } => {
                    if !ring.any_live() {
                        pc = self.target(*target);
                    }
                }
                Op::StorePos { slot } => {
                    slots[slot.0 as usize] = Some(cursor as usize);
                }
                Op::JumpIfSlotUnset { slot, target } => {
                    if slots[slot.0 as usize].is_none() {
                        pc = self.target(*target);
                    }
                }
                Op::SeekSlot { slot } => {
                    cursor = slots[slot.0 as usize].unwrap() as isize;
                }
                Op::SeekEnd => cursor = len,
                Op::AppendMatch { state, filter } => {
                    let origin = ring.get(0, *state as usize);
                    debug_assert_ne!(origin, DEAD);
                    if origin != DEAD {
                        let m = if backwards {
                            Match::new(cursor as usize, origin)
                        } else {
                            Match::new(origin, cursor as usize)
                        };
                        if *filter {
                            sink.append_filter(m);
                        } else {
                            sink.append_raw(m);
                        }
                    }
                }
                Op::AppendMatchFromSlots { start, end, filter } => {
                    let start = slots[start.0 as usize].unwrap();
                    let end = slots[end.0 as usize].unwrap();
                    let m = Match::new(start, end);
                    if *filter {
                        sink.append_filter(m);
                    } else {
                        sink.append_raw(m);
                    }
                }
                Op::Return => break,
            }
        }
    }
}

#[inline]
fn byte_at(input: &[u8], cursor: isize, offset: i32) -> Option<u8> {
    let pos = cursor + offset as isize;
    if pos < 0 {
        return None;
    }
    input.get(pos as usize).copied()
}

/// The time-indexed ring of automaton states, local to one scan activation.
///
/// Conceptually a circular array of `times` slots with one cell per state.
/// A cell is [`DEAD`] or holds the match-origin position threaded to that
/// state. Rotation is index arithmetic over `base`; the expiring slot is
/// cleared and becomes the farthest lookahead slot. The time summary keeps
/// one liveness flag per physical slot so a fully drained ring is detected
/// without touching every cell.
struct StateRing {
    cells: Vec<usize>,
    live: BitVec,
    times: usize,
    states: usize,
    base: usize,
}

impl StateRing {
    fn new(times: usize, states: usize) -> Self {
        assert!(times > 0 && states > 0);
        Self {
            cells: vec![DEAD; times * states],
            live: BitVec::repeat(false, times),
            times,
            states,
            base: 0,
        }
    }

    /// Physical slot index for a logical time.
    #[inline]
    fn slot(&self, time: usize) -> usize {
        assert!(time < self.times, "time {} out of ring range", time);
        (self.base + time) % self.times
    }

    #[inline]
    fn get(&self, time: usize, state: usize) -> usize {
        self.cells[self.slot(time) * self.states + state]
    }

    /// Makes `(time, state)` live with the given origin. When the cell is
    /// already live the preferred origin is kept: the smallest going
    /// forward (leftmost match start), the largest going backward
    /// (rightmost match end).
    fn set(&mut self, time: usize, state: usize, origin: usize, backwards: bool) {
        let slot = self.slot(time);
        let cell = &mut self.cells[slot * self.states + state];
        if *cell == DEAD
            || (backwards && origin > *cell)
            || (!backwards && origin < *cell)
        {
            *cell = origin;
        }
        self.live.set(slot, true);
    }

    fn clear_time(&mut self, time: usize) {
        let slot = self.slot(time);
        self.cells[slot * self.states..(slot + 1) * self.states].fill(DEAD);
        self.live.set(slot, false);
    }

    fn clear_all(&mut self) {
        self.cells.fill(DEAD);
        self.live.fill(false);
    }

    #[inline]
    fn any_live(&self) -> bool {
        self.live.any()
    }

    /// Rotates one slot: time 1 becomes time 0 and the expired time-0 slot
    /// is recycled as the farthest time. The expiring slot must have been
    /// cleared first, the generated code does so before every rotation.
    fn rotate(&mut self) {
        debug_assert!(!self.live[self.slot(0)]);
        self.base = (self.base + 1) % self.times;
    }
}

impl Display for Program {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (pc, op) in self.ops.iter().enumerate() {
            writeln!(f, "{:05}: {}", pc, self.op_to_string(op))?;
        }
        Ok(())
    }
}

impl Program {
    fn op_to_string(&self, op: &Op) -> String {
        let target = |label: &Label| format!("{:05}", self.target(*label));
        match op {
            Op::Jmp { target: t } => format!("JMP {}", target(t)),
            Op::JumpIfByteEq { offset, byte, target: t } => {
                format!("JBEQ [{:+}] {:#04x} {}", offset, byte, target(t))
            }
            Op::JumpIfByteNe { offset, byte, target: t } => {
                format!("JBNE [{:+}] {:#04x} {}", offset, byte, target(t))
            }
            Op::JumpIfInClass { offset, class, target: t } => format!(
                "JCLS [{:+}] class#{}({}) {}",
                offset,
                class.0,
                self.class(*class).count(),
                target(t)
            ),
            Op::JumpIfNotInClass { offset, class, target: t } => format!(
                "JNCLS [{:+}] class#{}({}) {}",
                offset,
                class.0,
                self.class(*class).count(),
                target(t)
            ),
            Op::JumpIfOob { offset, target: t } => {
                format!("JOOB [{:+}] {}", offset, target(t))
            }
            Op::JumpIfAtStart { target: t } => {
                format!("JSTART {}", target(t))
            }
            Op::JumpIfAtEnd { target: t } => format!("JEND {}", target(t)),
            Op::JumpIfCursorOut { target: t } => {
                format!("JOUT {}", target(t))
            }
            Op::SkipToByte { byte, target: t } => {
                format!("SKIP {:#04x} {}", byte, target(t))
            }
            Op::Advance { n } => format!("ADV {:+}", n),
            Op::SetDirection { backwards } => {
                format!("DIR {}", if *backwards { "BCK" } else { "FWD" })
            }
            Op::SetState { time, state, from } => {
                format!("SET t{} s{} <- s{}", time, state, from)
            }
            Op::SetStateForce { time, state } => {
                format!("SETF t{} s{}", time, state)
            }
            Op::JumpIfStateDead { time, state, target: t } => {
                format!("JDEAD t{} s{} {}", time, state, target(t))
            }
            Op::ClearTime { time } => format!("CLRT t{}", time),
            Op::ClearAllTimes => "CLRALL".to_string(),
            Op::NextTime => "NEXTT".to_string(),
            Op::JumpIfNoLiveTimes { target: t } => {
                format!("JDRAIN {}", target(t))
            }
            Op::StorePos { slot } => format!("SPOS slot{}", slot.0),
            Op::JumpIfSlotUnset { slot, target: t } => {
                format!("JUNSET slot{} {}", slot.0, target(t))
            }
            Op::SeekSlot { slot } => format!("SEEK slot{}", slot.0),
            Op::SeekEnd => "SEEKEND".to_string(),
            Op::AppendMatch { state, filter } => format!(
                "MATCH s{} {}",
                state,
                if *filter { "filter" } else { "raw" }
            ),
            Op::AppendMatchFromSlots { start, end, filter } => format!(
                "MATCHS slot{} slot{} {}",
                start.0,
                end.0,
                if *filter { "filter" } else { "raw" }
            ),
            Op::Return => "RET".to_string(),
        }
    }
}
