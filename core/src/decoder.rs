//! Streaming decode worker.
//!
//! One dedicated thread pops raw PCM frames off the [`FrameQueue`], extracts
//! the selected channel as normalized f32 samples, and feeds them to the
//! acoustic modem. Successful decodes are handed to the payload callback.

use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, error, warn};

use crate::error::{ProvisionError, Result};
use crate::queue::{AudioFrame, FrameQueue};
use crate::{MODEM_PROFILE, PROFILES_FILE_NAME, SAMPLE_RATE, SYSTEM_PROFILES_PATH};

/// The acoustic modem boundary. Implementations own all demodulator state
/// and are driven exclusively from the decode worker, never concurrently.
pub trait Modem: Send {
    /// Feed one buffer of normalized samples; returns a payload when a
    /// complete transmission has been demodulated.
    fn decode(&mut self, samples: &[f32]) -> Option<Vec<u8>>;
}

/// Modem construction parameters, with the profile file resolved by probing
/// a fixed list of locations.
#[derive(Debug, Clone)]
pub struct ModemConfig {
    pub sample_rate: u32,
    pub profile: String,
    pub profiles: PathBuf,
}

impl ModemConfig {
    /// Resolve the profiles file: an explicit path wins, then a
    /// `quiet-profiles.json` next to the executable, then the system
    /// location. None found is a fatal configuration error.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let profiles = match explicit {
            Some(path) if path.is_file() => path.to_path_buf(),
            Some(_) => return Err(ProvisionError::ProfilesNotFound),
            None => default_profiles_path().ok_or(ProvisionError::ProfilesNotFound)?,
        };
        Ok(Self {
            sample_rate: SAMPLE_RATE,
            profile: MODEM_PROFILE.to_owned(),
            profiles,
        })
    }
}

fn default_profiles_path() -> Option<PathBuf> {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let local = dir.join(PROFILES_FILE_NAME);
            if local.is_file() {
                return Some(local);
            }
        }
    }
    let system = PathBuf::from(SYSTEM_PROFILES_PATH);
    system.is_file().then_some(system)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SampleFormat {
    I16,
    I32,
}

impl SampleFormat {
    fn from_bits(bits: u32) -> Result<Self> {
        match bits {
            16 => Ok(Self::I16),
            32 => Ok(Self::I32),
            other => Err(ProvisionError::UnsupportedBitDepth(other)),
        }
    }
}

/// Capture format of the incoming frames.
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    pub channels: usize,
    pub select: usize,
    pub bits_per_sample: u32,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            channels: 1,
            select: 0,
            bits_per_sample: 16,
        }
    }
}

/// Extract the selected channel from an interleaved PCM frame and rescale
/// to [-1.0, 1.0].
fn extract_samples(
    frame: &[u8],
    format: SampleFormat,
    channels: usize,
    select: usize,
) -> Vec<f32> {
    match format {
        SampleFormat::I16 => frame
            .chunks_exact(2)
            .enumerate()
            .filter(|(i, _)| i % channels == select)
            .map(|(_, b)| i16::from_le_bytes([b[0], b[1]]) as f32 / 32768.0)
            .collect(),
        SampleFormat::I32 => frame
            .chunks_exact(4)
            .enumerate()
            .filter(|(i, _)| i % channels == select)
            .map(|(_, b)| i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f32 / 2147483648.0)
            .collect(),
    }
}

/// Handle for signalling the worker to stop from any thread, including the
/// worker itself. Does not join; the decoder owner runs the join in
/// [`StreamDecoder::stop`].
#[derive(Clone)]
pub struct StopHandle {
    queue: Arc<FrameQueue>,
    stop: Arc<AtomicBool>,
}

impl StopHandle {
    /// Raise the stop flag and enqueue a sentinel frame so a blocked `pop`
    /// wakes up and observes it.
    pub fn signal_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        self.queue.push(AudioFrame::new());
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

pub struct StreamDecoder {
    queue: Arc<FrameQueue>,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    format: SampleFormat,
    channels: usize,
    select: usize,
}

impl StreamDecoder {
    /// Fails fast on an unsupported bit depth or an out-of-range channel
    /// select, before any thread is spawned.
    pub fn new(config: DecoderConfig) -> Result<Self> {
        let format = SampleFormat::from_bits(config.bits_per_sample)?;
        if config.channels == 0 || config.select >= config.channels {
            return Err(ProvisionError::ChannelSelectOutOfRange {
                select: config.select,
                channels: config.channels,
            });
        }
        Ok(Self {
            queue: Arc::new(FrameQueue::new()),
            stop: Arc::new(AtomicBool::new(false)),
            worker: None,
            format,
            channels: config.channels,
            select: config.select,
        })
    }

    /// The shared frame queue, for the audio-capture producer.
    pub fn queue(&self) -> Arc<FrameQueue> {
        Arc::clone(&self.queue)
    }

    /// Enqueue one capture frame.
    pub fn push(&self, frame: AudioFrame) {
        self.queue.push(frame);
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            queue: Arc::clone(&self.queue),
            stop: Arc::clone(&self.stop),
        }
    }

    /// Spawn the decode worker. A no-op while a worker is already live;
    /// callback failures are logged and never end the loop, since the worker
    /// is the only path by which a retry frame can arrive.
    pub fn start<M, F>(&mut self, mut modem: M, mut on_data: F)
    where
        M: Modem + 'static,
        F: FnMut(&[u8]) -> Result<()> + Send + 'static,
    {
        if let Some(worker) = &self.worker {
            if !worker.is_finished() {
                debug!("decode worker already running");
                return;
            }
        }
        self.stop.store(false, Ordering::SeqCst);

        let queue = Arc::clone(&self.queue);
        let stop = Arc::clone(&self.stop);
        let (format, channels, select) = (self.format, self.channels, self.select);

        self.worker = Some(thread::spawn(move || {
            while !stop.load(Ordering::SeqCst) {
                let frame = queue.pop();
                if frame.is_empty() {
                    // Sentinel or empty capture buffer: no audio.
                    continue;
                }
                let samples = extract_samples(&frame, format, channels, select);
                let Some(payload) = modem.decode(&samples) else {
                    continue;
                };
                if payload.is_empty() {
                    continue;
                }
                match panic::catch_unwind(AssertUnwindSafe(|| on_data(&payload))) {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => warn!("credential payload rejected: {err}"),
                    Err(_) => error!("payload handler panicked; still listening"),
                }
            }
        }));
    }

    /// Stop the worker and join it. Safe before `start`, safe from any
    /// thread other than the worker, and does not deadlock if the worker
    /// already exited.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        self.queue.push(AudioFrame::new());
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("decode worker panicked");
            }
        }
    }
}

impl Drop for StreamDecoder {
    fn drop(&mut self) {
        self.stop();
    }
}
