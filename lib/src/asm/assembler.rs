use rustc_hash::FxHashMap;

use crate::ast::ByteClass;

/// A symbolic branch target. Labels are created unbound, can be referenced
/// by any number of ops, and must be bound to exactly one location before
/// assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Label(pub(super) u32);

/// A frame slot holding an input position. Slots are the symbolic register
/// facility of this layer: allocated by handle, spilled to the activation
/// frame, unset until the first store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Slot(pub(super) u32);

/// Handle to an interned 256-bit byte-class bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ClassId(pub(super) u32);

/// The operation vocabulary of the abstract machine.
///
/// Byte tests address the input relative to the cursor with a signed offset
/// measured in elements; an out-of-bounds access fails the test (jumps for
/// the negated forms, falls through for the positive ones). State-ring
/// cells are addressed as `(time, state)` pairs; a cell is either dead or
/// holds the match-origin position threaded to that state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Op {
    /// Unconditional jump.
    Jmp { target: Label },
    /// Jumps if the byte at `cursor + offset` is in bounds and equals
    /// `byte`.
    JumpIfByteEq { offset: i32, byte: u8, target: Label },
    /// Jumps if the byte at `cursor + offset` is out of bounds or differs
    /// from `byte`.
    JumpIfByteNe { offset: i32, byte: u8, target: Label },
    /// Jumps if the byte at `cursor + offset` is in bounds and belongs to
    /// the class.
    JumpIfInClass { offset: i32, class: ClassId, target: Label },
    /// Jumps if the byte at `cursor + offset` is out of bounds or not in
    /// the class.
    JumpIfNotInClass { offset: i32, class: ClassId, target: Label },
    /// Jumps if `cursor + offset` is out of the input bounds.
    JumpIfOob { offset: i32, target: Label },
    /// Jumps if the cursor sits at the start of the input.
    JumpIfAtStart { target: Label },
    /// Jumps if the cursor sits at the end of the input.
    JumpIfAtEnd { target: Label },
    /// Jumps if the cursor has moved past either end of the input.
    JumpIfCursorOut { target: Label },
    /// Advances the cursor to the next position whose byte equals `byte`,
    /// jumping to `target` when the input is exhausted first. Forward
    /// direction only.
    SkipToByte { byte: u8, target: Label },
    /// Moves the cursor by `n` elements. The emitter folds the scan
    /// direction into the sign.
    Advance { n: i32 },
    /// Switches the scan direction: cell preference and match-span
    /// orientation follow it.
    SetDirection { backwards: bool },
    /// Propagates the origin stored in cell `(0, from)` to cell
    /// `(time, state)`, keeping the direction-preferred origin when the
    /// target cell is already live.
    SetState { time: u16, state: u32, from: u32 },
    /// Makes `(time, state)` live with the current cursor position as the
    /// match origin.
    SetStateForce { time: u16, state: u32 },
    /// Jumps if cell `(time, state)` is dead.
    JumpIfStateDead { time: u16, state: u32, target: Label },
    /// Kills every state of one time slot.
    ClearTime { time: u16 },
    /// Kills every state of every time slot.
    ClearAllTimes,
    /// Rotates the ring one slot: the expiring time-0 slot is cleared and
    /// becomes the farthest lookahead slot.
    NextTime,
    /// Jumps if the time summary shows no live time slot.
    JumpIfNoLiveTimes { target: Label },
    /// Stores the cursor position into a frame slot.
    StorePos { slot: Slot },
    /// Jumps if the frame slot has never been stored to.
    JumpIfSlotUnset { slot: Slot, target: Label },
    /// Moves the cursor to the position stored in a frame slot.
    SeekSlot { slot: Slot },
    /// Moves the cursor to the end of the input.
    SeekEnd,
    /// Appends the span formed by the origin in cell `(0, state)` and the
    /// cursor; orientation follows the direction. `filter` selects the
    /// filtering append.
    AppendMatch { state: u32, filter: bool },
    /// Appends the span formed by two frame slots.
    AppendMatchFromSlots { start: Slot, end: Slot, filter: bool },
    /// Ends the scan.
    Return,
}

/// The abstract instruction sink driven by the code generator.
#[derive(Default)]
pub(crate) struct Assembler {
    ops: Vec<Op>,
    labels: Vec<Option<usize>>,
    classes: Vec<ByteClass>,
    class_ids: FxHashMap<ByteClass, ClassId>,
    slots: u32,
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new, unbound label.
    pub fn new_label(&mut self) -> Label {
        let label = Label(self.labels.len().try_into().unwrap());
        self.labels.push(None);
        label
    }

    /// Binds `label` to the location of the next emitted op.
    ///
    /// # Panics
    ///
    /// If the label was already bound. Double binding is a code-generator
    /// defect.
    pub fn bind(&mut self, label: Label) {
        let slot = &mut self.labels[label.0 as usize];
        assert!(slot.is_none(), "label bound twice");
        *slot = Some(self.ops.len());
    }

    /// Allocates a frame slot.
    pub fn new_slot(&mut self) -> Slot {
        let slot = Slot(self.slots);
        self.slots += 1;
        slot
    }

    /// Interns a byte class, deduplicating identical bitmaps.
    pub fn intern_class(&mut self, class: &ByteClass) -> ClassId {
        if let Some(id) = self.class_ids.get(class) {
            return *id;
        }
        let id = ClassId(self.classes.len().try_into().unwrap());
        self.classes.push(*class);
        self.class_ids.insert(*class, id);
        id
    }

    pub fn emit(&mut self, op: Op) {
        self.ops.push(op);
    }

    /// Resolves every label and produces the executable program.
    ///
    /// # Panics
    ///
    /// If any label is left unbound: the generated control flow would be
    /// incomplete, which is a code-generator defect, not an input error.
    pub fn assemble(
        self,
        ring_times: usize,
        state_count: usize,
    ) -> super::Program {
        let labels = self
            .labels
            .iter()
            .enumerate()
            .map(|(i, loc)| match loc {
                Some(pc) => *pc,
                None => panic!("unbound label {}", i),
            })
            .collect();

        super::Program::new(
            self.ops,
            labels,
            self.classes,
            ring_times,
            state_count,
            self.slots as usize,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{Assembler, Op};
    use crate::ast::ByteClass;

    #[test]
    fn label_resolution() {
        let mut masm = Assembler::new();
        let start = masm.new_label();
        let end = masm.new_label();
        masm.bind(start);
        masm.emit(Op::Advance { n: 1 });
        masm.emit(Op::JumpIfCursorOut { target: end });
        masm.emit(Op::Jmp { target: start });
        masm.bind(end);
        masm.emit(Op::Return);

        let program = masm.assemble(1, 1);
        assert_eq!(program.target(start), 0);
        assert_eq!(program.target(end), 3);
    }

    #[test]
    #[should_panic(expected = "unbound label")]
    fn unbound_label_panics() {
        let mut masm = Assembler::new();
        let dangling = masm.new_label();
        masm.emit(Op::Jmp { target: dangling });
        masm.assemble(1, 1);
    }

    #[test]
    fn class_interning_deduplicates() {
        let mut masm = Assembler::new();
        let mut digits = ByteClass::empty();
        digits.insert_range(b'0', b'9');
        let mut lower = ByteClass::empty();
        lower.insert_range(b'a', b'z');

        let a = masm.intern_class(&digits);
        let b = masm.intern_class(&lower);
        let c = masm.intern_class(&digits);
        assert_eq!(a, c);
        assert_ne!(a, b);
    }
}
