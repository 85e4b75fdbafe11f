// Sample rate and channel conversion for scheduled clips
// Recordings arrive at whatever rate they were captured with; the output
// stream runs at one fixed device rate, so clips are converted once at
// schedule time.

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::audio::decoder::DecodedSegment;
use crate::error::EngineError;

const CHUNK_FRAMES: usize = 1024;

/// Convert a decoded clip to the output stream's sample rate and channel
/// count. Returns a clone when no conversion is needed.
pub fn convert_segment(
    segment: &DecodedSegment,
    out_rate: u32,
    out_channels: usize,
) -> Result<DecodedSegment, EngineError> {
    let remixed = if segment.channels == out_channels {
        segment.clone()
    } else {
        remix_channels(segment, out_channels)
    };

    if remixed.sample_rate == out_rate {
        return Ok(remixed);
    }
    resample(&remixed, out_rate)
}

/// Up/down-mix interleaved samples to a new channel count: averaging down to
/// mono, duplicating the last channel when widening.
fn remix_channels(segment: &DecodedSegment, out_channels: usize) -> DecodedSegment {
    let in_channels = segment.channels.max(1);
    let frames = segment.frames();
    let mut samples = Vec::with_capacity(frames * out_channels);

    for frame in 0..frames {
        let row = &segment.samples[frame * in_channels..(frame + 1) * in_channels];
        if out_channels == 1 && in_channels > 1 {
            samples.push(row.iter().sum::<f32>() / in_channels as f32);
            continue;
        }
        for ch in 0..out_channels {
            let value = if ch < in_channels {
                row[ch]
            } else {
                row[in_channels - 1]
            };
            samples.push(value);
        }
    }

    DecodedSegment::new(samples, segment.sample_rate, out_channels)
}

fn resample(segment: &DecodedSegment, out_rate: u32) -> Result<DecodedSegment, EngineError> {
    let channels = segment.channels.max(1);
    let frames = segment.frames();
    if frames == 0 {
        return Ok(DecodedSegment::new(vec![], out_rate, segment.channels));
    }

    // Deinterleave into planar buffers the way rubato wants them
    let mut planar: Vec<Vec<f32>> = vec![Vec::with_capacity(frames); channels];
    for frame in 0..frames {
        for ch in 0..channels {
            planar[ch].push(segment.samples[frame * channels + ch]);
        }
    }

    let params = SincInterpolationParameters {
        sinc_len: 128,
        f_cutoff: 0.95,
        oversampling_factor: 128,
        interpolation: SincInterpolationType::Linear,
        window: WindowFunction::BlackmanHarris2,
    };
    let ratio = out_rate as f64 / segment.sample_rate as f64;
    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, CHUNK_FRAMES, channels)
        .map_err(|e| EngineError::Resample(e.to_string()))?;

    let mut out_planar: Vec<Vec<f32>> = vec![Vec::new(); channels];
    let mut pos = 0;
    while pos + CHUNK_FRAMES <= frames {
        let chunk: Vec<&[f32]> = planar.iter().map(|c| &c[pos..pos + CHUNK_FRAMES]).collect();
        let processed = resampler
            .process(&chunk, None)
            .map_err(|e| EngineError::Resample(e.to_string()))?;
        for (ch, data) in processed.into_iter().enumerate() {
            out_planar[ch].extend(data);
        }
        pos += CHUNK_FRAMES;
    }
    if pos < frames {
        let chunk: Vec<&[f32]> = planar.iter().map(|c| &c[pos..]).collect();
        let processed = resampler
            .process_partial(Some(&chunk), None)
            .map_err(|e| EngineError::Resample(e.to_string()))?;
        for (ch, data) in processed.into_iter().enumerate() {
            out_planar[ch].extend(data);
        }
    }

    let out_frames = out_planar[0].len();
    let mut samples = Vec::with_capacity(out_frames * channels);
    for frame in 0..out_frames {
        for plane in &out_planar {
            samples.push(plane[frame]);
        }
    }

    Ok(DecodedSegment::new(samples, out_rate, segment.channels))
}
