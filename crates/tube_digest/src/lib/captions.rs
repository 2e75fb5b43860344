//! WebVTT caption handling for the captions fast-path.
//!
//! YouTube automatic captions roll text across cues, so consecutive cues
//! usually share a suffix/prefix overlap that must be trimmed before the
//! transcript is usable.

use std::sync::LazyLock;

use regex::Regex;

use crate::transcript::Segment;

static CUE_TIMING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        ^\s*
        (?:(\d+):)?(\d{1,2}):(\d{2})[.,](\d{3})
        \s*-->\s*
        (?:(\d+):)?(\d{1,2}):(\d{2})[.,](\d{3})",
    )
    .unwrap()
});

// Inline cue markup such as <c> spans and word-level <00:00:01.500> stamps.
static CUE_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

fn parse_cue_timing(line: &str) -> Option<(f64, f64)> {
    let caps = CUE_TIMING_RE.captures(line)?;
    let part = |i: usize| {
        caps.get(i)
            .map(|m| m.as_str().parse::<f64>().unwrap_or(0.0))
            .unwrap_or(0.0)
    };

    let start = part(1) * 3600.0 + part(2) * 60.0 + part(3) + part(4) / 1000.0;
    let end = part(5) * 3600.0 + part(6) * 60.0 + part(7) + part(8) / 1000.0;
    Some((start, end))
}

fn clean_cue_text(lines: &[&str]) -> String {
    let joined = lines.join(" ");
    let without_tags = CUE_TAG_RE.replace_all(&joined, "");
    without_tags.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Length of the longest suffix of `prev` that is also a prefix of `next`,
/// in characters.
pub fn overlap_len(prev: &str, next: &str) -> usize {
    let prev_chars: Vec<char> = prev.chars().collect();
    let next_chars: Vec<char> = next.chars().collect();
    let max = prev_chars.len().min(next_chars.len());

    for k in (1..=max).rev() {
        if prev_chars[prev_chars.len() - k..] == next_chars[..k] {
            return k;
        }
    }
    0
}

/// Appends `segment`, first trimming the previous segment's text where it
/// overlaps the new one. A fully repeated previous segment is dropped.
pub fn dedupe_push(segments: &mut Vec<Segment>, segment: Segment) {
    if let Some(prev) = segments.last_mut() {
        let k = overlap_len(&prev.text, &segment.text);
        let prev_chars: Vec<char> = prev.text.chars().collect();

        if k == prev_chars.len() {
            segments.pop();
        } else if k > 0 {
            prev.text = prev_chars[..prev_chars.len() - k].iter().collect();
        }
    }
    segments.push(segment);
}

/// Parses a WebVTT document into de-duplicated transcript segments.
///
/// Cues with empty text or a span shorter than a whole second are skipped,
/// matching what the caption formatter keeps.
pub fn parse_vtt(content: &str) -> Vec<Segment> {
    let mut segments = Vec::new();

    let mut lines = content.lines().peekable();
    while let Some(line) = lines.next() {
        let Some((start, end)) = parse_cue_timing(line) else {
            continue;
        };

        let mut cue_lines = Vec::new();
        while let Some(text) = lines.peek() {
            if text.trim().is_empty() {
                break;
            }
            cue_lines.push(lines.next().unwrap());
        }

        let text = clean_cue_text(&cue_lines);
        if text.is_empty() || start as i64 == end as i64 {
            continue;
        }

        dedupe_push(&mut segments, Segment { start, end, text });
    }

    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(text: &str) -> Segment {
        Segment {
            start: 0.0,
            end: 2.0,
            text: text.to_string(),
        }
    }

    #[test]
    fn partial_overlap_trims_the_previous_segment() {
        let mut segments = vec![seg("hello world")];
        dedupe_push(&mut segments, seg("world is wide"));

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "hello ");
        assert_eq!(segments[1].text, "world is wide");
    }

    #[test]
    fn full_overlap_drops_the_previous_segment() {
        let mut segments = vec![seg("hello world")];
        dedupe_push(&mut segments, seg("hello world"));

        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "hello world");
    }

    #[test]
    fn no_overlap_keeps_both_segments() {
        let mut segments = vec![seg("first cue")];
        dedupe_push(&mut segments, seg("second cue"));

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "first cue");
    }

    #[test]
    fn overlap_len_counts_runes_not_bytes() {
        assert_eq!(overlap_len("naïve café", "café au lait"), 4);
        assert_eq!(overlap_len("abc", "xyz"), 0);
        assert_eq!(overlap_len("abab", "abab"), 4);
    }

    #[test]
    fn parses_cues_and_strips_inline_markup() {
        let vtt = "WEBVTT\nKind: captions\nLanguage: en\n\n\
            00:00:00.480 --> 00:00:03.119 align:start position:0%\n\
            so<00:00:00.880><c> today</c><c> we</c><c> are</c>\n\n\
            00:00:03.119 --> 00:00:05.200\n\
            so today we are going to look\n\n\
            00:01:02.000 --> 00:01:02.500\n\
            blink\n\n\
            01:00:01.000 --> 01:00:04.000\n\
            an hour in\n";

        let segments = parse_vtt(vtt);

        // The sub-second cue is skipped and the fully rolled-over first cue
        // is dropped by de-duplication.
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "so today we are going to look");
        assert!((segments[0].start - 3.119).abs() < 1e-9);
        assert_eq!(segments[1].text, "an hour in");
        assert!((segments[1].start - 3601.0).abs() < 1e-9);
    }

    #[test]
    fn parses_mm_ss_timings_without_hours() {
        let vtt = "WEBVTT\n\n00:05.000 --> 00:09.000\nshort form timing\n";
        let segments = parse_vtt(vtt);
        assert_eq!(segments.len(), 1);
        assert!((segments[0].start - 5.0).abs() < 1e-9);
        assert!((segments[0].end - 9.0).abs() < 1e-9);
    }
}
