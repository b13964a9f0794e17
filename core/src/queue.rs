//! Thread-safe FIFO of raw audio frames.
//!
//! Decouples the audio-capture producer from the decode worker. The queue is
//! unbounded: sessions are short-lived enough that backpressure is not worth
//! the complexity of a capacity limit.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

/// One capture buffer of interleaved PCM bytes. An empty frame is the
/// shutdown sentinel; the decode loop treats it as silence.
pub type AudioFrame = Vec<u8>;

pub struct FrameQueue {
    frames: Mutex<VecDeque<AudioFrame>>,
    ready: Condvar,
}

impl FrameQueue {
    pub fn new() -> Self {
        Self {
            frames: Mutex::new(VecDeque::new()),
            ready: Condvar::new(),
        }
    }

    /// Append a frame without blocking and wake one pending `pop`.
    pub fn push(&self, frame: AudioFrame) {
        let mut frames = self.frames.lock().unwrap();
        frames.push_back(frame);
        self.ready.notify_one();
    }

    /// Remove the oldest frame, blocking until one is available.
    pub fn pop(&self) -> AudioFrame {
        let mut frames = self.frames.lock().unwrap();
        loop {
            if let Some(frame) = frames.pop_front() {
                return frame;
            }
            frames = self.ready.wait(frames).unwrap();
        }
    }

    pub fn len(&self) -> usize {
        self.frames.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for FrameQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_pop_returns_pushed_frames_in_order() {
        let queue = FrameQueue::new();
        queue.push(vec![1, 2]);
        queue.push(vec![3, 4]);

        assert_eq!(queue.pop(), vec![1, 2]);
        assert_eq!(queue.pop(), vec![3, 4]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_pop_blocks_until_push() {
        let queue = Arc::new(FrameQueue::new());
        let (tx, rx) = mpsc::channel();

        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                tx.send(queue.pop()).unwrap();
            })
        };

        // Nothing queued yet, so the consumer must still be blocked.
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());

        queue.push(vec![7]);
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(2)).unwrap(),
            vec![7]
        );
        consumer.join().unwrap();
    }

    #[test]
    fn test_sentinel_unblocks_one_waiter() {
        let queue = Arc::new(FrameQueue::new());
        let (tx, rx) = mpsc::channel();

        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                tx.send(queue.pop()).unwrap();
            })
        };

        queue.push(AudioFrame::new());
        let frame = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(frame.is_empty());
        consumer.join().unwrap();
    }
}
