// Production audio host using cpal
// Scheduled clips are mixed inside the output callback; the audio clock is
// derived from the number of frames the device has consumed, which keeps the
// scheduler and the animation driver on the same timeline as the hardware.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::StreamConfig;
use parking_lot::Mutex;
use ringbuf::{
    traits::{Producer, Split},
    HeapRb,
};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::audio::decoder::DecodedSegment;
use crate::audio::host::{AudioHost, SourceId};
use crate::audio::resample::convert_segment;
use crate::error::EngineError;

// ~185ms of mono output history for the amplitude analyzer at 44.1kHz
const TAP_BUFFER_SIZE: usize = 8192;

pub type TapProducer = ringbuf::HeapProd<f32>;
pub type TapConsumer = ringbuf::HeapCons<f32>;

/// One clip mixed into the output from `start_frame` onward. Samples are
/// already converted to the output rate and channel count.
struct ActiveSource {
    id: SourceId,
    samples: Arc<Vec<f32>>,
    start_frame: u64,
    frames: usize,
}

/// Cpal-backed `AudioHost` for the default output device
pub struct CpalHost {
    sources: Arc<Mutex<Vec<ActiveSource>>>,
    frames_played: Arc<AtomicU64>,
    paused: Arc<AtomicBool>,
    volume: Arc<Mutex<f32>>,
    next_id: AtomicU64,
    tap: Mutex<Option<TapConsumer>>,
    sample_rate: u32,
    channels: usize,
}

impl CpalHost {
    /// Open the default output device and start the stream
    pub fn new() -> Result<Self, EngineError> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or(EngineError::NoOutputDevice)?;

        let config = device
            .default_output_config()
            .map_err(|e| EngineError::Stream(format!("no default output config: {}", e)))?;

        let sample_rate = config.sample_rate().0;
        let channels = config.channels() as usize;

        let sources: Arc<Mutex<Vec<ActiveSource>>> = Arc::new(Mutex::new(Vec::new()));
        let frames_played = Arc::new(AtomicU64::new(0));
        let paused = Arc::new(AtomicBool::new(false));
        let volume = Arc::new(Mutex::new(1.0f32));

        let rb = HeapRb::<f32>::new(TAP_BUFFER_SIZE);
        let (tap_producer, tap_consumer) = rb.split();

        let mixer = MixerState {
            sources: sources.clone(),
            frames_played: frames_played.clone(),
            paused: paused.clone(),
            volume: volume.clone(),
            tap: tap_producer,
            channels,
            scratch: vec![0.0; channels],
        };

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => Self::build_stream::<f32>(&device, &config.into(), mixer)?,
            cpal::SampleFormat::I16 => Self::build_stream::<i16>(&device, &config.into(), mixer)?,
            cpal::SampleFormat::U16 => Self::build_stream::<u16>(&device, &config.into(), mixer)?,
            format => return Err(EngineError::UnsupportedFormat(format!("{:?}", format))),
        };

        stream
            .play()
            .map_err(|e| EngineError::Stream(format!("failed to start stream: {}", e)))?;

        // cpal streams are not Send, but this host is shared across threads
        // and lives for the process. The stream is leaked on purpose and
        // controlled entirely through the shared flags above.
        std::mem::forget(stream);

        Ok(Self {
            sources,
            frames_played,
            paused,
            volume,
            next_id: AtomicU64::new(0),
            tap: Mutex::new(Some(tap_consumer)),
            sample_rate,
            channels,
        })
    }

    fn build_stream<T: cpal::SizedSample + cpal::FromSample<f32>>(
        device: &cpal::Device,
        config: &StreamConfig,
        mut mixer: MixerState,
    ) -> Result<cpal::Stream, EngineError> {
        let stream = device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    mixer.fill(data);
                },
                move |err| {
                    tracing::error!("audio output error: {}", err);
                },
                None,
            )
            .map_err(|e| EngineError::Stream(format!("failed to build output stream: {}", e)))?;

        Ok(stream)
    }

    /// Take the consumer end of the live-output tap, feeding the amplitude
    /// analyzer. Can be taken once.
    pub fn take_amplitude_tap(&self) -> Option<TapConsumer> {
        self.tap.lock().take()
    }
}

/// Everything the output callback owns
struct MixerState {
    sources: Arc<Mutex<Vec<ActiveSource>>>,
    frames_played: Arc<AtomicU64>,
    paused: Arc<AtomicBool>,
    volume: Arc<Mutex<f32>>,
    tap: TapProducer,
    channels: usize,
    scratch: Vec<f32>,
}

impl MixerState {
    fn fill<T: cpal::SizedSample + cpal::FromSample<f32>>(&mut self, data: &mut [T]) {
        let frames = data.len() / self.channels;

        // Paused: emit silence without advancing the clock
        if self.paused.load(Ordering::SeqCst) {
            for sample in data.iter_mut() {
                *sample = T::from_sample(0.0);
            }
            return;
        }

        let mut sources = self.sources.lock();
        let vol = *self.volume.lock();
        let base = self.frames_played.load(Ordering::SeqCst);

        for i in 0..frames {
            let position = base + i as u64;
            self.scratch.iter_mut().for_each(|s| *s = 0.0);

            for source in sources.iter() {
                if position < source.start_frame {
                    continue;
                }
                let frame_idx = (position - source.start_frame) as usize;
                if frame_idx >= source.frames {
                    continue;
                }
                let row = &source.samples[frame_idx * self.channels..(frame_idx + 1) * self.channels];
                for (acc, &s) in self.scratch.iter_mut().zip(row) {
                    *acc += s;
                }
            }

            let mut mono = 0.0;
            for ch in 0..self.channels {
                let value = self.scratch[ch] * vol;
                data[i * self.channels + ch] = T::from_sample(value);
                mono += value;
            }
            // Tap feeds the amplitude analyzer; a lagging consumer just
            // loses history
            let _ = self.tap.try_push(mono / self.channels as f32);
        }

        let end = base + frames as u64;
        sources.retain(|s| end < s.start_frame + s.frames as u64);
        self.frames_played.store(end, Ordering::SeqCst);
    }
}

impl AudioHost for CpalHost {
    fn now(&self) -> f64 {
        self.frames_played.load(Ordering::SeqCst) as f64 / self.sample_rate as f64
    }

    fn output_rate(&self) -> u32 {
        self.sample_rate
    }

    fn output_channels(&self) -> usize {
        self.channels
    }

    fn schedule(&self, segment: Arc<DecodedSegment>, start: f64) -> Result<SourceId, EngineError> {
        let converted = convert_segment(&segment, self.sample_rate, self.channels)?;
        let frames = converted.frames();
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;

        self.sources.lock().push(ActiveSource {
            id,
            samples: Arc::new(converted.samples),
            start_frame: (start * self.sample_rate as f64).round() as u64,
            frames,
        });

        Ok(id)
    }

    fn stop(&self, id: SourceId) {
        self.sources.lock().retain(|s| s.id != id);
    }

    fn is_finished(&self, id: SourceId) -> bool {
        !self.sources.lock().iter().any(|s| s.id == id)
    }

    fn set_volume(&self, volume: f32) {
        *self.volume.lock() = volume.clamp(0.0, 1.0);
    }

    fn volume(&self) -> f32 {
        *self.volume.lock()
    }

    fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }
}
