/*! A regular expression engine that compiles patterns into self-contained
scan programs.

Instead of interpreting a parsed pattern, the engine lowers it into a
routine that simulates the pattern's automaton directly: automaton states
live in a time-indexed ring of cells local to each scan, a fast-forward
prefilter skips input that provably cannot begin a match, and match spans
are reported according to the requested [`MatchKind`] policy.

The main type is [`Regexp`]: compiling a pattern produces one, and scanning
it over a byte buffer yields match spans. A compiled [`Regexp`] holds no
per-scan state, so it can be shared across threads and scanned concurrently.

# Example

```rust
use rxjit::{MatchKind, Regexp};

let re = Regexp::compile("a|ab", MatchKind::Longest).unwrap();
let spans = re.scan(b"ab");

assert_eq!(spans.len(), 1);
assert_eq!((spans[0].start, spans[0].end), (0, 2));
```
*/

mod asm;
mod ast;
mod codegen;
mod matches;
mod parser;

#[cfg(test)]
mod tests;

use log::debug;
use thiserror::Error;

pub use crate::asm::Program;
pub use crate::codegen::MatchKind;
pub use crate::matches::{Match, MatchSink, Matches};

use crate::ast::Arena;
use crate::codegen::{Codegen, CompileContext, FfFinder, Indexer, Lister};
use crate::parser::Parser;

/// Errors returned while compiling a pattern.
#[derive(Error, Debug)]
pub enum Error {
    /// The pattern is not a valid regular expression.
    #[error("syntax error: {0}")]
    Syntax(String),

    /// The pattern uses a feature this engine does not implement.
    #[error("unsupported pattern feature: {0}")]
    Unsupported(String),

    /// The pattern would compile into an automaton larger than the engine
    /// is willing to simulate.
    #[error("pattern too large")]
    TooLarge,
}

/// Options controlling how a pattern is compiled.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompileOptions {
    /// Parse the pattern as case-insensitive.
    pub case_insensitive: bool,
    /// Let `.` match any byte, including newlines.
    pub dot_matches_new_line: bool,
}

/// A compiled regular expression.
pub struct Regexp {
    program: Program,
}

impl Regexp {
    /// Compiles `pattern` for the given match policy.
    pub fn compile(pattern: &str, kind: MatchKind) -> Result<Self, Error> {
        Self::compile_with_options(pattern, kind, CompileOptions::default())
    }

    /// Compiles `pattern` with explicit [`CompileOptions`].
    pub fn compile_with_options(
        pattern: &str,
        kind: MatchKind,
        options: CompileOptions,
    ) -> Result<Self, Error> {
        let ctx = build_context(pattern, options)?;
        let program = Codegen::compile(&ctx, kind)?;
        Ok(Self { program })
    }

    /// Scans `input` and returns the match spans the policy produces, in
    /// discovery order.
    pub fn scan(&self, input: &[u8]) -> Vec<Match> {
        let mut matches = Matches::new();
        self.program.scan(input, &mut matches);
        matches.into_vec()
    }

    /// Scans `input`, reporting spans into a caller-owned sink.
    pub fn scan_into(&self, input: &[u8], sink: &mut dyn MatchSink) {
        self.program.scan(input, sink);
    }

    /// Returns the first span the scan produces, if any.
    pub fn find(&self, input: &[u8]) -> Option<Match> {
        self.scan(input).first().copied()
    }
}

impl std::fmt::Display for Regexp {
    /// Renders the compiled program as an instruction listing.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.program, f)
    }
}

/// Runs the pre-codegen pipeline: parse, index, flatten, select the
/// fast-forward elements.
fn build_context(
    pattern: &str,
    options: CompileOptions,
) -> Result<CompileContext, Error> {
    let mut arena = Arena::new();

    let root = Parser::new()
        .case_insensitive(options.case_insensitive)
        .dot_matches_new_line(options.dot_matches_new_line)
        .parse(pattern, &mut arena)?;

    let mut ctx = CompileContext::new(arena, root);

    Indexer::new(&mut ctx).index();
    Lister::new(&mut ctx).list_tree();
    FfFinder::new(&mut ctx).find_ff_elements();

    debug!(
        "pattern lowered: {} states, {} matching, {} control node(s)",
        ctx.state_count,
        ctx.matching.len(),
        ctx.control.len(),
    );

    Ok(ctx)
}
