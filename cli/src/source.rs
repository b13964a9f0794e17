//! Audio-capture producers feeding the frame queue.
//!
//! Live capture reads raw interleaved PCM from stdin (e.g. piped from
//! `arecord -f S16_LE -r 48000`); replay reads a WAV file via `hound`.
//! Either way the producer runs on its own thread and pushes byte frames
//! into the shared [`FrameQueue`].

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{info, warn};

use heywifi_core::FrameQueue;

#[derive(Debug, Clone)]
pub enum AudioInput {
    Stdin,
    Wav(PathBuf),
}

/// Fill `buf` from `reader`, returning the number of bytes read; short only
/// at end of stream.
fn fill(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}

/// Spawn the capture thread. `frame_bytes` is the capture buffer size in
/// bytes; `sample_bytes` keeps truncated tail reads sample-aligned.
pub fn spawn_capture(
    input: AudioInput,
    queue: Arc<FrameQueue>,
    frame_bytes: usize,
    sample_bytes: usize,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let result = match input {
            AudioInput::Stdin => capture_stdin(&queue, frame_bytes, sample_bytes),
            AudioInput::Wav(path) => replay_wav(&path, &queue, frame_bytes),
        };
        if let Err(err) = result {
            warn!("audio capture stopped: {err}");
        }
        info!("audio input exhausted");
    })
}

fn capture_stdin(
    queue: &FrameQueue,
    frame_bytes: usize,
    sample_bytes: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let stdin = std::io::stdin();
    let mut reader = stdin.lock();
    loop {
        let mut frame = vec![0u8; frame_bytes];
        let filled = fill(&mut reader, &mut frame)?;
        if filled == 0 {
            return Ok(());
        }
        frame.truncate(filled - filled % sample_bytes);
        queue.push(frame);
        if filled < frame_bytes {
            return Ok(());
        }
    }
}

fn replay_wav(
    path: &Path,
    queue: &FrameQueue,
    frame_bytes: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let reader = hound::WavReader::new(File::open(path)?)?;
    let spec = reader.spec();
    info!(
        "replaying {}: {} Hz, {} channel(s), {} bits",
        path.display(),
        spec.sample_rate,
        spec.channels,
        spec.bits_per_sample
    );

    let mut frame = Vec::with_capacity(frame_bytes);
    let mut push_full = |frame: &mut Vec<u8>| {
        if frame.len() >= frame_bytes {
            queue.push(std::mem::take(frame));
        }
    };

    match spec.bits_per_sample {
        16 => {
            for sample in reader.into_samples::<i16>() {
                frame.extend_from_slice(&sample?.to_le_bytes());
                push_full(&mut frame);
            }
        }
        32 => {
            for sample in reader.into_samples::<i32>() {
                frame.extend_from_slice(&sample?.to_le_bytes());
                push_full(&mut frame);
            }
        }
        other => return Err(format!("unsupported WAV bit depth: {other}").into()),
    }
    if !frame.is_empty() {
        queue.push(frame);
    }
    Ok(())
}
