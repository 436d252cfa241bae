/*!
The instruction-emission and execution layer.

The code generator treats this layer as an abstract instruction sink: it
allocates symbolic labels and frame slots, interns byte classes, and emits
operations addressing state-ring cells as typed `(time, state)` operands.
[`Assembler::assemble`] resolves every label and produces a [`Program`], the
opaque executable handle whose `scan` entry point runs the routine over an
input buffer. The generator performs no encoding of its own and never
depends on this layer's representation.
*/

mod assembler;
mod program;

pub(crate) use assembler::{Assembler, Label, Op, Slot};
pub use program::Program;
