//! VAD & speaker segmenter.
//!
//! Runs RMS-window energy analysis across the two synchronized PCM16 tracks
//! of a bridge recording and produces an ordered sequence of speaker
//! segments. Unlike a live single-track VAD, this operates post-hoc over
//! the whole recording once both sockets have closed.

use regex::Regex;
use std::sync::LazyLock;

/// Window size: 300 ms at 8 kHz.
pub const WINDOW_SAMPLES: usize = 2400;
pub const SAMPLE_RATE: u32 = 8000;

const ENERGY_FLOOR: f64 = 50.0;
const DOMINANCE_RATIO: f64 = 1.2;
const CODOMINANCE_RATIO: f64 = 0.8;
const MIN_SEGMENT_SECS: f64 = 0.5;
const MERGE_GAP_SECS: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    Sdr,
    Bianca,
    Lead,
}

impl Speaker {
    pub fn as_str(self) -> &'static str {
        match self {
            Speaker::Sdr => "SDR",
            Speaker::Bianca => "BIANCA",
            Speaker::Lead => "LEAD",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Segment {
    pub speaker: Speaker,
    pub start_sec: f64,
    pub end_sec: f64,
    pub text: String,
}

/// RMS energy of a window of PCM16 samples.
pub fn calculate_energy(window: &[i16]) -> f64 {
    if window.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = window.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum_sq / window.len() as f64).sqrt()
}

fn classify_window(sdr_energy: f64, outbound_energy: f64, in_announcement_span: bool) -> Option<Speaker> {
    if sdr_energy > ENERGY_FLOOR && sdr_energy > outbound_energy * DOMINANCE_RATIO {
        Some(Speaker::Sdr)
    } else if outbound_energy > ENERGY_FLOOR && outbound_energy >= sdr_energy * CODOMINANCE_RATIO {
        Some(if in_announcement_span { Speaker::Bianca } else { Speaker::Lead })
    } else {
        None
    }
}

/// Segment the SDR (right channel) and lead/BIANCA (left channel) tracks
/// into ordered, speaker-attributed, non-overlapping segments. `text` is
/// left empty; callers fill it in via the transcription client per segment.
pub fn segment_tracks(left_lead_bianca: &[i16], right_sdr: &[i16], announcement_span_secs: f64) -> Vec<Segment> {
    let total_samples = left_lead_bianca.len().max(right_sdr.len());
    let window_count = total_samples.div_ceil(WINDOW_SAMPLES);

    let mut raw: Vec<(Speaker, f64, f64)> = Vec::new();
    for w in 0..window_count {
        let start = w * WINDOW_SAMPLES;
        let end = (start + WINDOW_SAMPLES).min(total_samples);
        let sdr_window = slice_or_empty(right_sdr, start, end);
        let out_window = slice_or_empty(left_lead_bianca, start, end);

        let sdr_energy = calculate_energy(sdr_window);
        let out_energy = calculate_energy(out_window);

        let start_sec = start as f64 / SAMPLE_RATE as f64;
        let end_sec = end as f64 / SAMPLE_RATE as f64;
        let in_announcement = start_sec < announcement_span_secs;

        if let Some(speaker) = classify_window(sdr_energy, out_energy, in_announcement) {
            raw.push((speaker, start_sec, end_sec));
        }
    }

    merge_and_filter(raw)
}

fn slice_or_empty(buf: &[i16], start: usize, end: usize) -> &[i16] {
    if start >= buf.len() {
        &[]
    } else {
        &buf[start..end.min(buf.len())]
    }
}

fn merge_adjacent(raw: Vec<(Speaker, f64, f64)>) -> Vec<(Speaker, f64, f64)> {
    let mut segments: Vec<(Speaker, f64, f64)> = Vec::new();

    for (speaker, start, end) in raw {
        if let Some(last) = segments.last_mut() {
            if last.0 == speaker && start - last.2 < MERGE_GAP_SECS {
                last.2 = end;
                continue;
            }
        }
        segments.push((speaker, start, end));
    }

    segments
}

/// Merge adjacent same-speaker runs, then drop sub-minimum segments and
/// re-merge — dropping a short segment can expose a new same-speaker
/// adjacency (e.g. SDR/LEAD/SDR with the LEAD sliver dropped), so this
/// alternates filter and merge until the segment count stops changing.
fn merge_and_filter(raw: Vec<(Speaker, f64, f64)>) -> Vec<Segment> {
    let mut segments = merge_adjacent(raw);
    loop {
        let before = segments.len();
        segments.retain(|s| s.2 - s.1 >= MIN_SEGMENT_SECS);
        segments = merge_adjacent(segments);
        if segments.len() == before {
            break;
        }
    }

    segments.into_iter().map(|(speaker, start_sec, end_sec)| Segment { speaker, start_sec, end_sec, text: String::new() }).collect()
}

static RING_TONE_ARTIFACT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)b[iy]+ng|r[iy]+ng|[\p{Cf}\p{So}]|\[[^\]]*\]").unwrap());

/// Collapse any run of 3 or more identical letters (case-insensitive) to
/// nothing — the regex crate has no backreferences, so repeated-character
/// artifacts ("aaaaa", "Riiiiing" after the ring/bing words are stripped)
/// are detected with a manual scan instead.
fn strip_repeated_runs(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let mut j = i + 1;
        while j < chars.len() && chars[j].eq_ignore_ascii_case(&chars[i]) {
            j += 1;
        }
        let run_len = j - i;
        if run_len < 3 || !chars[i].is_alphabetic() {
            out.extend(&chars[i..j]);
        }
        i = j;
    }
    out
}

/// Strip repeated-character ring-tone artifacts, control/emoji characters,
/// and bracketed noise tags from a transcript fragment. Idempotent.
pub fn clean_ring_tone_artifacts(text: &str) -> String {
    let without_tags = RING_TONE_ARTIFACT.replace_all(text, "");
    strip_repeated_runs(&without_tags).trim().to_string()
}

static ANNOUNCEMENT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)novo lead|conectando com o|n[aã]o foi poss[ií]vel confirmar|a liga[cç][aã]o ser[aá] encerrada")
        .unwrap()
});

/// True if `text` matches one of the known pre-recorded announcement
/// phrases (used both by the lead-speech pre-check and the post-
/// transcription LEAD→BIANCA correction pass).
pub fn matches_announcement_pattern(text: &str) -> bool {
    ANNOUNCEMENT_PATTERN.is_match(text)
}

/// After transcription, reassign any LEAD segment whose text is actually the
/// announcement (misattributed TTS ring-down) to BIANCA.
pub fn correct_announcement_misattribution(segments: &mut [Segment]) {
    for seg in segments.iter_mut() {
        if seg.speaker == Speaker::Lead && matches_announcement_pattern(&seg.text) {
            seg.speaker = Speaker::Bianca;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(amplitude: i16, samples: usize) -> Vec<i16> {
        vec![amplitude; samples]
    }

    #[test]
    fn silence_produces_no_segments() {
        let left = tone(0, WINDOW_SAMPLES * 3);
        let right = tone(0, WINDOW_SAMPLES * 3);
        assert!(segment_tracks(&left, &right, 6.0).is_empty());
    }

    #[test]
    fn sdr_dominant_window_is_attributed_to_sdr() {
        let left = tone(0, WINDOW_SAMPLES * 3);
        let right = tone(2000, WINDOW_SAMPLES * 3);
        let segs = segment_tracks(&left, &right, 0.0);
        assert_eq!(segs.len(), 1);
        assert_eq!(segs[0].speaker, Speaker::Sdr);
    }

    #[test]
    fn outbound_inside_announcement_span_is_bianca_else_lead() {
        let mut left = tone(2000, WINDOW_SAMPLES * 2);
        left.extend(tone(2000, WINDOW_SAMPLES * 2));
        let right = tone(0, left.len());
        // announcement window covers only the first two windows (~0.6s)
        let segs = segment_tracks(&left, &right, 0.6);
        assert!(segs.iter().any(|s| s.speaker == Speaker::Bianca));
        assert!(segs.iter().any(|s| s.speaker == Speaker::Lead));
    }

    #[test]
    fn short_segments_are_dropped() {
        let raw = vec![(Speaker::Sdr, 0.0, 0.2)];
        assert!(merge_and_filter(raw).is_empty());
    }

    #[test]
    fn adjacent_same_speaker_segments_merge_within_gap() {
        let raw = vec![(Speaker::Sdr, 0.0, 0.6), (Speaker::Sdr, 1.2, 1.8)];
        let merged = merge_and_filter(raw);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].end_sec, 1.8);
    }

    #[test]
    fn dropping_a_short_sliver_re_merges_the_surrounding_same_speaker_segments() {
        let raw = vec![(Speaker::Sdr, 0.0, 0.6), (Speaker::Lead, 0.6, 0.65), (Speaker::Sdr, 0.7, 1.3)];
        let merged = merge_and_filter(raw);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].speaker, Speaker::Sdr);
        assert_eq!(merged[0].start_sec, 0.0);
        assert_eq!(merged[0].end_sec, 1.3);
    }

    #[test]
    fn segments_are_ordered_and_non_overlapping() {
        let raw = vec![(Speaker::Sdr, 0.0, 0.6), (Speaker::Lead, 3.0, 3.6)];
        let merged = merge_and_filter(raw);
        for w in merged.windows(2) {
            assert!(w[0].end_sec <= w[1].start_sec);
        }
    }

    #[test]
    fn ring_tone_cleanup_is_idempotent() {
        let text = "BIIIIING RIIIING [noise] aaaaa hello";
        let once = clean_ring_tone_artifacts(text);
        let twice = clean_ring_tone_artifacts(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn announcement_misattribution_is_corrected() {
        let mut segs = vec![Segment {
            speaker: Speaker::Lead,
            start_sec: 0.0,
            end_sec: 1.0,
            text: "Novo lead: conectando com o especialista".to_string(),
        }];
        correct_announcement_misattribution(&mut segs);
        assert_eq!(segs[0].speaker, Speaker::Bianca);
    }
}
