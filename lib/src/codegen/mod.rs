/*!
The code-generation core.

The pipeline runs leaf-first over one [`CompileContext`]:

1. [`Indexer`] walks the tree and assigns every node its entry/output
   automaton-state pair.
2. [`Lister`] flattens the tree into the matching and control lists,
   synthesizing explicit epsilon markers for the joins the tree encoded
   structurally.
3. [`FfFinder`] selects the fast-forward elements used as a cheap
   prefilter, or none when no cheap filter exists.
4. [`Codegen`] lowers the indexed, flattened automaton into the scan
   routine: state-ring bookkeeping, per-node transitions, match checking
   and registration, direction selection. It drives the fast-forward
   generator as a sub-phase.

Compilation either fully succeeds, returning an executable program, or
aborts; callers never observe a half-built routine. Structurally impossible
states (an epsilon reaching the indexer, an unrecognized kind in a
dispatcher) are defects of an earlier phase and panic via `unreachable!`.
*/

pub(crate) mod context;
pub(crate) mod ff_finder;
pub(crate) mod ff_gen;
pub(crate) mod generator;
pub(crate) mod indexer;
pub(crate) mod lister;

#[cfg(test)]
mod tests;

pub(crate) use context::CompileContext;
pub(crate) use ff_finder::FfFinder;
pub(crate) use generator::Codegen;
pub(crate) use indexer::Indexer;
pub(crate) use lister::Lister;

pub use generator::MatchKind;

/// Scan direction of the generated routine. Backward scanning discovers the
/// leftmost start of a rightmost-ending match by walking from a located end
/// position toward the start of the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    Forward,
    Backward,
}
