//! Property coverage for the layout engine: wrapped lines respect the
//! width, and search over the formatted result agrees with a naive scan of
//! the source text.

use core_format::{Fmt, display_width, format};
use core_style::Color;
use proptest::prelude::*;

proptest! {
    #[test]
    fn wrapped_lines_never_exceed_width(
        text in "[ -~]{0,200}",
        width in 1usize..40,
    ) {
        let p = format(&Fmt::text(text), width, Color::Yellow);
        for i in 0..p.line_count() {
            prop_assert!(display_width(p.plain(i)) <= width);
        }
    }

    #[test]
    fn search_agrees_with_naive_scan(
        text in "[ab ]{0,120}",
        width in 1usize..30,
    ) {
        let p = format(&Fmt::text(text.clone()), width, Color::Yellow);
        let needle = "ab";
        let expected = text.matches(needle).count();
        let hits = p.find(needle);
        prop_assert_eq!(hits.len(), expected);
        // In order and disjoint: each start strictly after the previous end.
        for pair in hits.windows(2) {
            let prev = pair[0].end;
            let next = pair[1].start;
            prop_assert!(prev.0 < next.0 || (prev.0 == next.0 && prev.1 <= next.1));
        }
    }

    #[test]
    fn translate_round_trips_recorded_runes(
        text in "[a-z]{1,80}",
        width in 1usize..20,
    ) {
        let p = format(&Fmt::text(text.clone()), width, Color::Yellow);
        for (off, ch) in text.chars().enumerate() {
            let (line, col) = p.translate(0, off).expect("anchored rune");
            let got = p.plain(line).chars().nth(col).expect("column in range");
            prop_assert_eq!(got, ch);
        }
    }
}
