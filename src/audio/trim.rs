// Leading/trailing silence removal for raw microphone captures
// Library clips are stored pre-trimmed; trimming them again would be lossy,
// so this is only applied to freshly captured recordings.

use crate::audio::decoder::DecodedSegment;
use crate::settings::TrimSettings;

/// Trim near-silence from both ends of a capture, keeping a fixed padding
/// outside the audible window.
///
/// The scan runs sample-by-sample on the first channel: forward until
/// |amplitude| exceeds the threshold, backward likewise. Both bounds are
/// then pushed outward by the padding. A degenerate window (`end <= start`,
/// i.e. nothing audible) returns the buffer unchanged rather than dropping
/// audio. Sample rate and channel count are preserved.
pub fn trim_silence(segment: &DecodedSegment, settings: &TrimSettings) -> DecodedSegment {
    let channels = segment.channels.max(1);
    let frames = segment.frames();
    if frames == 0 {
        return segment.clone();
    }

    let audible = |frame: usize| segment.samples[frame * channels].abs() > settings.threshold;

    let first = (0..frames).find(|&f| audible(f));
    let last = (0..frames).rev().find(|&f| audible(f));

    let (first, last) = match (first, last) {
        (Some(a), Some(b)) => (a, b),
        _ => return segment.clone(),
    };

    let padding = (settings.padding_secs * segment.sample_rate as f64).round() as usize;
    let start = first.saturating_sub(padding);
    let end = (last + 1 + padding).min(frames);

    if end <= start {
        return segment.clone();
    }

    DecodedSegment::new(
        segment.samples[start * channels..end * channels].to_vec(),
        segment.sample_rate,
        segment.channels,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 10_000; // padding of 0.1s == 1000 frames

    fn capture(lead: usize, body: usize, tail: usize) -> DecodedSegment {
        let mut samples = vec![0.001f32; lead];
        samples.extend(std::iter::repeat(0.5f32).take(body));
        samples.extend(std::iter::repeat(0.001f32).take(tail));
        DecodedSegment::new(samples, RATE, 1)
    }

    #[test]
    fn test_trims_to_padded_window() {
        let seg = capture(5000, 2000, 5000);
        let trimmed = trim_silence(&seg, &TrimSettings::default());
        // 1000 frames of padding survive on each side of the 2000-frame body
        assert_eq!(trimmed.frames(), 4000);
        assert_eq!(trimmed.sample_rate, RATE);
        assert_eq!(trimmed.channels, 1);
    }

    #[test]
    fn test_padding_clamps_at_buffer_edges() {
        let seg = capture(100, 2000, 100);
        let trimmed = trim_silence(&seg, &TrimSettings::default());
        // Wanted 1000 frames of padding, buffer only has 100 on each side
        assert_eq!(trimmed.frames(), 2200);
    }

    #[test]
    fn test_pure_silence_returned_unchanged() {
        let seg = DecodedSegment::new(vec![0.001f32; 8000], RATE, 1);
        let trimmed = trim_silence(&seg, &TrimSettings::default());
        assert_eq!(trimmed, seg);
    }

    #[test]
    fn test_empty_buffer_unchanged() {
        let seg = DecodedSegment::new(vec![], RATE, 1);
        assert_eq!(trim_silence(&seg, &TrimSettings::default()).frames(), 0);
    }

    #[test]
    fn test_scan_reads_first_channel_of_stereo() {
        // Audible only on channel 0; channel 1 stays silent
        let lead = 3000usize;
        let body = 1000usize;
        let mut samples = vec![0.0f32; lead * 2];
        for _ in 0..body {
            samples.push(0.5);
            samples.push(0.0);
        }
        samples.extend(std::iter::repeat(0.0f32).take(3000 * 2));
        let seg = DecodedSegment::new(samples, RATE, 2);

        let trimmed = trim_silence(&seg, &TrimSettings::default());
        assert_eq!(trimmed.channels, 2);
        assert_eq!(trimmed.frames(), body + 2000);
    }
}
