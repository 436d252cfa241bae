use pretty_assertions::assert_eq;

use crate::codegen::Codegen;
use crate::{
    build_context, CompileOptions, Error, Match, MatchKind, MatchSink,
    Matches, Regexp,
};

fn scan(pattern: &str, kind: MatchKind, input: &[u8]) -> Vec<(usize, usize)> {
    Regexp::compile(pattern, kind)
        .unwrap()
        .scan(input)
        .iter()
        .map(|m| (m.start, m.end))
        .collect()
}

fn scan_backward(pattern: &str, input: &[u8]) -> Vec<(usize, usize)> {
    let ctx = build_context(pattern, CompileOptions::default()).unwrap();
    let program = Codegen::compile_backward(&ctx).unwrap();
    let mut matches = Matches::new();
    program.scan(input, &mut matches);
    matches.iter().map(|m| (m.start, m.end)).collect()
}

#[test]
fn first_match_in_the_middle() {
    assert_eq!(scan("ab", MatchKind::First, b"xaby"), vec![(1, 3)]);
}

#[test]
fn repetition_of_zero_matches_the_empty_input() {
    assert_eq!(scan("a*", MatchKind::First, b""), vec![(0, 0)]);
}

#[test]
fn longest_prefers_the_longer_alternative() {
    assert_eq!(scan("a|ab", MatchKind::Longest, b"ab"), vec![(0, 2)]);
}

#[test]
fn line_anchor_matches_only_after_the_newline() {
    assert_eq!(scan("^ab", MatchKind::First, b"\nab"), vec![(1, 3)]);
}

#[test]
fn first_match_stops_the_scan() {
    assert_eq!(scan("a", MatchKind::First, b"aaa"), vec![(0, 1)]);
}

#[test]
fn no_match_yields_an_empty_list() {
    assert_eq!(scan("ab", MatchKind::First, b"zzzz"), vec![]);
    assert_eq!(scan("ab", MatchKind::Longest, b"zzzz"), vec![]);
    assert_eq!(scan("ab", MatchKind::All, b"zzzz"), vec![]);
}

#[test]
fn all_matches_are_non_overlapping() {
    assert_eq!(
        scan("ab", MatchKind::All, b"abxab"),
        vec![(0, 2), (3, 5)]
    );
    assert_eq!(
        scan("a", MatchKind::All, b"aaa"),
        vec![(0, 1), (1, 2), (2, 3)]
    );
}

#[test]
fn all_matches_longer_match_supersedes() {
    assert_eq!(scan("a+", MatchKind::All, b"aaa"), vec![(0, 3)]);
    assert_eq!(
        scan("a+", MatchKind::All, b"aaba"),
        vec![(0, 2), (3, 4)]
    );
}

#[test]
fn all_matches_nullable_pattern() {
    assert_eq!(
        scan("a*", MatchKind::All, b"aab"),
        vec![(0, 2), (3, 3)]
    );
}

#[test]
fn longest_spans_the_whole_repetition() {
    assert_eq!(scan("a+", MatchKind::Longest, b"aaab"), vec![(0, 3)]);
}

#[test]
fn longest_finds_the_rightmost_end() {
    // The rightmost-ending match wins, even though an earlier one exists.
    assert_eq!(scan("ab|b", MatchKind::Longest, b"ab"), vec![(0, 2)]);
}

#[test]
fn anchored_at_both_ends() {
    assert_eq!(scan("^ab$", MatchKind::First, b"ab"), vec![(0, 2)]);
    assert_eq!(scan("^ab$", MatchKind::First, b"xab"), vec![]);
    assert_eq!(scan("^ab$", MatchKind::First, b"ab\ncd"), vec![(0, 2)]);
}

#[test]
fn line_end_before_newline() {
    assert_eq!(scan("ab$", MatchKind::First, b"ab\ncd"), vec![(0, 2)]);
    assert_eq!(scan("cd$", MatchKind::First, b"ab\ncd"), vec![(3, 5)]);
}

#[test]
fn classes_and_wildcards() {
    assert_eq!(
        scan("[0-9]+", MatchKind::Longest, b"abc123xyz"),
        vec![(3, 6)]
    );
    assert_eq!(scan("(?s)a.c", MatchKind::First, b"axc"), vec![(0, 3)]);
    assert_eq!(scan("a.c", MatchKind::First, b"a\nc"), vec![]);
}

#[test]
fn empty_pattern_matches_everywhere_first() {
    assert_eq!(scan("", MatchKind::First, b"abc"), vec![(0, 0)]);
}

#[test]
fn case_insensitive_option() {
    let re = Regexp::compile_with_options(
        "foo",
        MatchKind::First,
        CompileOptions { case_insensitive: true, ..Default::default() },
    )
    .unwrap();
    assert_eq!(re.find(b"xFoO").map(|m| (m.start, m.end)), Some((1, 4)));
}

#[test]
fn find_returns_the_first_span() {
    let re = Regexp::compile("ab", MatchKind::All).unwrap();
    assert_eq!(re.find(b"xabxab").map(|m| m.start), Some(1));
    assert_eq!(re.find(b"zzz"), None);
}

#[test]
fn scan_into_reports_through_the_caller_sink() {
    struct Counting(usize);
    impl crate::MatchSink for Counting {
        fn append_raw(&mut self, _: Match) {
            self.0 += 1;
        }
        fn append_filter(&mut self, _: Match) {
            self.0 += 1;
        }
    }

    let re = Regexp::compile("a", MatchKind::All).unwrap();
    let mut sink = Counting(0);
    re.scan_into(b"aaa", &mut sink);
    assert_eq!(sink.0, 3);
}

#[test]
fn backward_scan_finds_the_rightmost_match_first() {
    assert_eq!(scan_backward("ab", b"abxab"), vec![(3, 5)]);
    assert_eq!(scan_backward("ab", b"xaby"), vec![(1, 3)]);
    assert_eq!(scan_backward("ab", b"zzz"), vec![]);
}

#[test]
fn direction_symmetry() {
    // Scanning backward for a pattern is the mirror image of scanning the
    // reversed input forward for the reversed pattern.
    let cases: &[(&str, &str, &[u8])] =
        &[("ab", "ba", b"abxab"), ("abc", "cba", b"zabcz"), ("a", "a", b"xa")];

    for (pattern, reversed_pattern, input) in cases {
        let backward = scan_backward(pattern, input);

        let reversed_input: Vec<u8> =
            input.iter().rev().copied().collect();
        let forward =
            scan(reversed_pattern, MatchKind::First, &reversed_input);

        let mirrored: Vec<(usize, usize)> = forward
            .iter()
            .map(|(s, e)| (input.len() - e, input.len() - s))
            .collect();

        assert_eq!(backward, mirrored, "pattern {:?}", pattern);
    }
}

#[test]
fn overlapping_candidates_from_a_backward_scan_are_filtered() {
    // A backward scan discovers candidates right to left, so overlapping
    // spans reach the filtering append in reversed order. The first
    // discovered candidate wins; later overlapping ones are dropped,
    // adjacent ones survive.
    let mut matches = Matches::new();
    matches.append_filter(Match::new(2, 6));
    matches.append_filter(Match::new(0, 4));
    matches.append_filter(Match::new(0, 2));
    assert_eq!(
        matches.as_slice(),
        &[Match::new(2, 6), Match::new(0, 2)]
    );
}

#[test]
fn errors_are_reported_not_panicked() {
    assert!(matches!(
        Regexp::compile("[", MatchKind::First),
        Err(Error::Syntax(_))
    ));
    assert!(matches!(
        Regexp::compile(r"\bword", MatchKind::First),
        Err(Error::Unsupported(_))
    ));
    assert!(matches!(
        Regexp::compile("x{999}", MatchKind::First),
        Err(Error::TooLarge)
    ));
}

#[test]
fn compiled_regexp_is_shareable_across_threads() {
    let re = Regexp::compile("ab", MatchKind::All).unwrap();
    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                assert_eq!(re.scan(b"abxab").len(), 2);
            });
        }
    });
}

#[test]
fn display_renders_the_program_listing() {
    let re = Regexp::compile("ab", MatchKind::First).unwrap();
    let listing = re.to_string();
    assert!(listing.contains("SKIP 0x61"));
    assert!(listing.contains("RET"));
}
