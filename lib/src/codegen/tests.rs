use pretty_assertions::assert_eq;

use crate::asm::Op;
use crate::ast::{NodeId, NodeKind};
use crate::build_context;
use crate::codegen::{Codegen, CompileContext, FfFinder, MatchKind};
use crate::{CompileOptions, Error};

fn context(pattern: &str) -> CompileContext {
    build_context(pattern, CompileOptions::default()).unwrap()
}

fn kind(ctx: &CompileContext, id: NodeId) -> &NodeKind {
    &ctx.arena.node(id).kind
}

fn states(ctx: &CompileContext, id: NodeId) -> (u32, u32) {
    let node = ctx.arena.node(id);
    (node.entry_state, node.output_state)
}

// ---------------------------------------------------------------- indexer

#[test]
fn literal_gets_entry_and_fresh_output() {
    let ctx = context("abc");
    assert_eq!(states(&ctx, ctx.root), (0, 1));
    assert_eq!(ctx.state_count, 2);
}

#[test]
fn sequence_chains_child_states() {
    let ctx = context("ab(cd)(ef)");
    assert_eq!(ctx.matching.len(), 3);
    assert_eq!(states(&ctx, ctx.matching[0]), (0, 1));
    assert_eq!(states(&ctx, ctx.matching[1]), (1, 2));
    assert_eq!(states(&ctx, ctx.matching[2]), (2, 3));
    assert_eq!(ctx.state_count, 4);
}

#[test]
fn alternation_fans_out_and_joins() {
    let ctx = context("foo|bar|baz");
    assert_eq!(ctx.matching.len(), 3);
    for id in ctx.matching.iter() {
        assert_eq!(states(&ctx, *id), (0, 1));
    }
    assert_eq!(ctx.state_count, 2);
}

#[test]
fn repetition_loops_body_back_to_entry() {
    let ctx = context("a*");
    // The body consumes input without leaving the entry state; the
    // zero-iterations epsilon joins entry to output.
    assert_eq!(states(&ctx, ctx.matching[0]), (0, 0));
    assert_eq!(ctx.control.len(), 1);
    assert_eq!(*kind(&ctx, ctx.control[0]), NodeKind::Epsilon);
    assert_eq!(states(&ctx, ctx.control[0]), (0, 1));
}

#[test]
fn matching_leaves_never_collapse_entry_into_output() {
    for pattern in ["ab", "a|bc", "x(y)z", "a{2,4}", "^a+$"] {
        let ctx = context(pattern);
        for id in ctx.matching.iter() {
            let (entry, output) = states(&ctx, *id);
            // A repetition body may loop back onto its own entry, but a
            // leaf output is never a fresh copy of its entry.
            if !matches!(kind(&ctx, *id), NodeKind::Literal(_))
                || entry != output
            {
                continue;
            }
            // entry == output is only legal for loop bodies.
            let loops = ctx
                .matching
                .iter()
                .any(|other| states(&ctx, *other).1 == entry);
            assert!(loops, "{}: leaf with entry == output", pattern);
        }
    }
}

#[test]
fn every_state_reachable_from_entry() {
    for pattern in ["a*b", "(a|b)c", "a{2,4}", "^x$", "x?y", "(ab)+c"] {
        let ctx = context(pattern);
        let mut reachable = vec![false; ctx.state_count as usize];
        reachable[ctx.entry_state() as usize] = true;
        let mut changed = true;
        while changed {
            changed = false;
            for id in ctx.matching.iter().chain(ctx.control.iter()) {
                let (entry, output) = states(&ctx, *id);
                if reachable[entry as usize] && !reachable[output as usize] {
                    reachable[output as usize] = true;
                    changed = true;
                }
            }
        }
        assert!(
            reachable.iter().all(|r| *r),
            "{}: unreachable states",
            pattern
        );
    }
}

// ----------------------------------------------------------------- lister

#[test]
fn lists_partition_the_leaf_set() {
    let ctx = context("a*b|^c");
    for id in ctx.matching.iter() {
        assert!(kind(&ctx, *id).is_matching());
    }
    for id in ctx.control.iter() {
        assert!(!kind(&ctx, *id).is_matching());
    }
    // Leaves: a, b, c plus the repetition epsilon and the line anchor.
    assert_eq!(ctx.matching.len(), 3);
    assert_eq!(ctx.control.len(), 2);
}

#[test]
fn lists_follow_flattened_traversal_order() {
    let ctx = context("a*b|^c");
    let matched: Vec<&NodeKind> =
        ctx.matching.iter().map(|id| kind(&ctx, *id)).collect();
    assert_eq!(
        matched,
        vec![
            &NodeKind::Literal(Box::from(&b"a"[..])),
            &NodeKind::Literal(Box::from(&b"b"[..])),
            &NodeKind::Literal(Box::from(&b"c"[..])),
        ]
    );
    assert_eq!(*kind(&ctx, ctx.control[0]), NodeKind::Epsilon);
    assert_eq!(*kind(&ctx, ctx.control[1]), NodeKind::LineStart);
}

#[test]
fn optional_branch_synthesizes_epsilon() {
    let ctx = context("x?y");
    assert_eq!(ctx.control.len(), 1);
    assert_eq!(*kind(&ctx, ctx.control[0]), NodeKind::Epsilon);
    // The epsilon shares the optional node's state pair.
    assert_eq!(states(&ctx, ctx.control[0]), states(&ctx, ctx.matching[0]));
}

// ------------------------------------------------------------- ff finder

#[test]
fn single_literal_is_its_own_prefilter() {
    let ctx = context("abc");
    assert_eq!(ctx.ff_elements.len(), 1);
    assert_eq!(
        *kind(&ctx, ctx.ff_elements[0]),
        NodeKind::Literal(Box::from(&b"abc"[..]))
    );
}

#[test]
fn alternation_contributes_every_branch() {
    let ctx = context("(foo|bar)x");
    assert_eq!(ctx.ff_elements.len(), 2);
}

#[test]
fn common_first_byte_collapses_branches() {
    let ctx = context("(foo|fop)x");
    assert_eq!(ctx.ff_elements.len(), 1);
}

#[test]
fn optional_head_joins_the_element_set() {
    let ctx = context("a*foo");
    assert_eq!(ctx.ff_elements.len(), 2);
}

#[test]
fn nullable_pattern_has_no_prefilter() {
    for pattern in ["a*", "a?", "(ab)*|c*", ""] {
        let ctx = context(pattern);
        assert!(
            ctx.ff_elements.is_empty(),
            "{}: expected no prefilter",
            pattern
        );
    }
}

#[test]
fn alphabet_wide_probe_is_useless() {
    let ctx = context("(?s).x");
    assert!(ctx.ff_elements.is_empty());
}

#[test]
fn assertion_is_skipped_not_selected() {
    let ctx = context("^foo");
    assert_eq!(ctx.ff_elements.len(), 1);
    assert!(kind(&ctx, ctx.ff_elements[0]).is_matching());
}

#[test]
fn reduce_cmp_favors_the_narrower_range() {
    let mut ctx = context("(a|[0-9])z");
    assert_eq!(ctx.ff_elements.len(), 2);
    let list = ctx.ff_elements.clone();
    let finder = FfFinder::new(&mut ctx);
    // One literal byte against a ten-byte class: positive means the first
    // range is the cheaper filter.
    assert!(finder.ff_reduce_cmp(&list, 0, 1) > 0);
}

// ---------------------------------------------------------------- codegen

#[test]
fn skip_loop_uses_the_byte_skip_primitive() {
    let ctx = context("abc");
    let program = Codegen::compile(&ctx, MatchKind::First).unwrap();
    let skips = program
        .ops()
        .iter()
        .filter(|op| matches!(op, Op::SkipToByte { byte: b'a', .. }))
        .count();
    // Once for the early fast-forward, once for the in-loop one.
    assert_eq!(skips, 2);
}

#[test]
fn ring_is_sized_by_the_longest_literal() {
    let ctx = context("abcd|x");
    let program = Codegen::compile(&ctx, MatchKind::First).unwrap();
    assert_eq!(program.ring_times(), 5);
}

#[test]
fn assertion_only_pattern_has_a_single_time() {
    let ctx = context("^");
    let program = Codegen::compile(&ctx, MatchKind::First).unwrap();
    assert_eq!(program.ring_times(), 1);
}

#[test]
fn oversized_ring_is_rejected() {
    let pattern = format!("{}{}", "z".repeat(1050), "(a)".repeat(1000));
    let ctx = context(&pattern);
    assert!(matches!(
        Codegen::compile(&ctx, MatchKind::First),
        Err(Error::TooLarge)
    ));
}

#[test]
fn listing_shows_the_whole_routine() {
    let ctx = context("a|b$");
    let program = Codegen::compile(&ctx, MatchKind::All).unwrap();
    let listing = program.to_string();
    assert!(listing.contains("RET"));
    assert!(listing.contains("NEXTT"));
    assert!(listing.contains("SETF"));
    assert!(listing.lines().count() == program.ops().len());
}

// ------------------------------------------- reference interpreter check

/// All end positions of matches of `id` starting at `pos`, by naive tree
/// walking. The oracle the compiled programs are checked against.
fn ends_at(
    ctx: &CompileContext,
    id: NodeId,
    input: &[u8],
    pos: usize,
) -> Vec<usize> {
    match kind(ctx, id).clone() {
        NodeKind::Empty => vec![pos],
        NodeKind::Literal(bytes) => {
            if input[pos..].starts_with(&bytes) {
                vec![pos + bytes.len()]
            } else {
                vec![]
            }
        }
        NodeKind::AnyByte => {
            if pos < input.len() {
                vec![pos + 1]
            } else {
                vec![]
            }
        }
        NodeKind::Class(class) => {
            if pos < input.len() && class.contains(input[pos]) {
                vec![pos + 1]
            } else {
                vec![]
            }
        }
        NodeKind::LineStart => {
            if pos == 0 || input[pos - 1] == b'\n' {
                vec![pos]
            } else {
                vec![]
            }
        }
        NodeKind::LineEnd => {
            if pos == input.len() || input[pos] == b'\n' {
                vec![pos]
            } else {
                vec![]
            }
        }
        NodeKind::Concat(children) => {
            let mut positions = vec![pos];
            for child in children {
                let mut next = Vec::new();
                for p in positions {
                    for q in ends_at(ctx, child, input, p) {
                        if !next.contains(&q) {
                            next.push(q);
                        }
                    }
                }
                positions = next;
            }
            positions
        }
        NodeKind::Alternation(children) => {
            let mut positions = Vec::new();
            for child in children {
                for q in ends_at(ctx, child, input, pos) {
                    if !positions.contains(&q) {
                        positions.push(q);
                    }
                }
            }
            positions
        }
        NodeKind::Repetition(body) => {
            let mut seen = vec![pos];
            let mut frontier = vec![pos];
            while let Some(p) = frontier.pop() {
                for q in ends_at(ctx, body, input, p) {
                    if !seen.contains(&q) {
                        seen.push(q);
                        frontier.push(q);
                    }
                }
            }
            seen
        }
        NodeKind::Group(body) => ends_at(ctx, body, input, pos),
        NodeKind::Epsilon => unreachable!("epsilon in the reference tree"),
    }
}

/// The first match under the compiled engine's policy: the span completing
/// earliest, the leftmost one among simultaneous completions.
fn reference_first_match(
    ctx: &CompileContext,
    input: &[u8],
) -> Option<(usize, usize)> {
    let mut best: Option<(usize, usize)> = None;
    for start in 0..=input.len() {
        for end in ends_at(ctx, ctx.root, input, start) {
            let candidate = (start, end);
            best = Some(match best {
                None => candidate,
                Some(best) => {
                    if (end, start) < (best.1, best.0) {
                        candidate
                    } else {
                        best
                    }
                }
            });
        }
    }
    best
}

#[test]
fn compiled_first_match_agrees_with_the_reference() {
    let patterns = [
        "ab",
        "a|ab",
        "a*",
        "a+b",
        "(a|b)*c",
        "^ab",
        "ab$",
        "[0-9]+",
        "(?s)a.c",
        "foo|bar|baz",
        "a{2,3}",
        "x?y",
        "^$",
        "(ab)*",
    ];
    let inputs: &[&[u8]] = &[
        b"",
        b"a",
        b"ab",
        b"aab",
        b"xaby",
        b"ba\nab",
        b"123abc",
        b"ab\nxab",
        b"aaab",
        b"xfoobar",
        b"axc",
        b"xy",
        b"y",
        b"abab",
        b"zzzz",
    ];

    for pattern in patterns {
        let ctx = context(pattern);
        let compiled = Codegen::compile(&ctx, MatchKind::First).unwrap();
        for input in inputs {
            let mut matches = crate::Matches::new();
            compiled.scan(input, &mut matches);
            let compiled_first = matches
                .as_slice()
                .first()
                .map(|m| (m.start, m.end));
            assert_eq!(
                compiled_first,
                reference_first_match(&ctx, input),
                "pattern {:?} over {:?}",
                pattern,
                String::from_utf8_lossy(input),
            );
        }
    }
}
