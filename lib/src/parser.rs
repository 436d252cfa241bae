/*!
Front-end for the compiler.

Parsing proper is delegated to the [`regex-syntax`][1] crate; this module
lowers its high-level intermediate representation into the arena syntax tree
consumed by the indexer. Unicode handling is disabled, the engine works on
raw bytes.

[1]: https://docs.rs/regex-syntax
*/

use regex_syntax::hir::{Class, Hir, HirKind, Look};

use crate::ast::{Arena, ByteClass, NodeId, NodeKind};
use crate::Error;

/// Maximum number of body copies a bounded repetition may expand into.
/// Repetitions are expanded structurally (`x{2,4}` becomes `xxx?x?`), so
/// large bounds would blow up the automaton size.
pub(crate) const MAX_REP_COUNT: u32 = 255;

/// Parses a regexp pattern into an arena syntax tree.
pub(crate) struct Parser {
    case_insensitive: bool,
    dot_matches_new_line: bool,
}

impl Parser {
    pub fn new() -> Self {
        Self { case_insensitive: false, dot_matches_new_line: false }
    }

    /// Parses the pattern as a case-insensitive one.
    pub fn case_insensitive(mut self, yes: bool) -> Self {
        self.case_insensitive = yes;
        self
    }

    /// If true, `.` matches any byte, including newlines.
    pub fn dot_matches_new_line(mut self, yes: bool) -> Self {
        self.dot_matches_new_line = yes;
        self
    }

    /// Parses `pattern` and returns the root of the lowered tree.
    pub fn parse(
        &self,
        pattern: &str,
        arena: &mut Arena,
    ) -> Result<NodeId, Error> {
        let mut parser = regex_syntax::ParserBuilder::new()
            .unicode(false)
            .utf8(false)
            .multi_line(true)
            .case_insensitive(self.case_insensitive)
            .dot_matches_new_line(self.dot_matches_new_line)
            .build();

        let hir = parser
            .parse(pattern)
            .map_err(|err| Error::Syntax(err.to_string()))?;

        self.lower(&hir, arena)
    }

    fn lower(&self, hir: &Hir, arena: &mut Arena) -> Result<NodeId, Error> {
        match hir.kind() {
            HirKind::Empty => Ok(arena.alloc(NodeKind::Empty)),
            HirKind::Literal(literal) => {
                Ok(arena.alloc(NodeKind::Literal(literal.0.clone())))
            }
            HirKind::Class(class) => self.lower_class(class, arena),
            HirKind::Look(look) => match look {
                Look::Start | Look::StartLF | Look::StartCRLF => {
                    Ok(arena.alloc(NodeKind::LineStart))
                }
                Look::End | Look::EndLF | Look::EndCRLF => {
                    Ok(arena.alloc(NodeKind::LineEnd))
                }
                look => Err(Error::Unsupported(format!(
                    "look-around assertion {:?}",
                    look
                ))),
            },
            HirKind::Repetition(rep) => {
                let sub = self.lower(&rep.sub, arena)?;
                self.lower_repetition(sub, rep.min, rep.max, arena)
            }
            HirKind::Capture(cap) => {
                let body = self.lower(&cap.sub, arena)?;
                Ok(arena.alloc(NodeKind::Group(body)))
            }
            HirKind::Concat(subs) => {
                let children = subs
                    .iter()
                    .map(|sub| self.lower(sub, arena))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(arena.alloc(NodeKind::Concat(children)))
            }
            HirKind::Alternation(subs) => {
                let children = subs
                    .iter()
                    .map(|sub| self.lower(sub, arena))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(arena.alloc(NodeKind::Alternation(children)))
            }
        }
    }

    fn lower_class(
        &self,
        class: &Class,
        arena: &mut Arena,
    ) -> Result<NodeId, Error> {
        let byte_class = match class {
            Class::Bytes(class) => {
                let mut bytes = ByteClass::empty();
                for range in class.ranges() {
                    bytes.insert_range(range.start(), range.end());
                }
                bytes
            }
            // Unicode classes can appear even though the parser was built
            // with unicode support disabled. This is a well-known issue with
            // the `regex-syntax` crate.
            // See: https://github.com/rust-lang/regex/issues/1088
            Class::Unicode(class) => match class.to_byte_class() {
                Some(class) => {
                    let mut bytes = ByteClass::empty();
                    for range in class.ranges() {
                        bytes.insert_range(range.start(), range.end());
                    }
                    bytes
                }
                None => {
                    return Err(Error::Unsupported(
                        "non-byte character class".to_string(),
                    ))
                }
            },
        };

        if byte_class.is_full() {
            Ok(arena.alloc(NodeKind::AnyByte))
        } else {
            Ok(arena.alloc(NodeKind::Class(byte_class)))
        }
    }

    /// Expands a `{min,max}` repetition structurally: `min` mandatory copies
    /// of the body, followed by an unbounded loop (`max == None`) or by
    /// `max - min` optional copies.
    fn lower_repetition(
        &self,
        sub: NodeId,
        min: u32,
        max: Option<u32>,
        arena: &mut Arena,
    ) -> Result<NodeId, Error> {
        if min > MAX_REP_COUNT || max.unwrap_or(0) > MAX_REP_COUNT {
            return Err(Error::TooLarge);
        }

        let mut first_use = true;
        let mut parts = Vec::new();

        for _ in 0..min {
            parts.push(instance(&mut first_use, sub, arena));
        }

        match max {
            None => {
                let body = instance(&mut first_use, sub, arena);
                parts.push(arena.alloc(NodeKind::Repetition(body)));
            }
            Some(max) => {
                for _ in min..max {
                    let body = instance(&mut first_use, sub, arena);
                    let empty = arena.alloc(NodeKind::Empty);
                    parts.push(
                        arena.alloc(NodeKind::Alternation(vec![body, empty])),
                    );
                }
            }
        }

        match parts.len() {
            0 => Ok(arena.alloc(NodeKind::Empty)),
            1 => Ok(parts.pop().unwrap()),
            _ => Ok(arena.alloc(NodeKind::Concat(parts))),
        }
    }
}

/// Returns the original subtree on first use and a fresh deep copy on every
/// use after that.
fn instance(first_use: &mut bool, sub: NodeId, arena: &mut Arena) -> NodeId {
    if *first_use {
        *first_use = false;
        sub
    } else {
        arena.clone_subtree(sub)
    }
}
