//! Hand-off from an audio callback to the analysis loop.
//!
//! The callback owns a [`CaptureWriter`] and never blocks: samples that do
//! not fit are dropped and counted. The analysis side owns the
//! [`CaptureReader`] and pulls whole, non-overlapping windows into a
//! [`SampleBuffer`].

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

use crate::sample_buffer::SampleBuffer;

pub struct CaptureWriter {
    producer: HeapProd<f32>,
    dropped: Arc<AtomicUsize>,
}

pub struct CaptureReader {
    consumer: HeapCons<f32>,
    capacity: usize,
    dropped: Arc<AtomicUsize>,
}

/// Queue holding up to `windows` windows of `window_len` samples.
pub fn capture_queue(window_len: usize, windows: usize) -> (CaptureWriter, CaptureReader) {
    let capacity = (window_len * windows.max(1)).max(1);
    let (producer, consumer) = HeapRb::<f32>::new(capacity).split();
    let dropped = Arc::new(AtomicUsize::new(0));
    log::debug!(target: "capture", "capture queue: {} samples ({} x {})", capacity, windows, window_len);
    (
        CaptureWriter { producer, dropped: Arc::clone(&dropped) },
        CaptureReader { consumer, capacity, dropped },
    )
}

impl CaptureWriter {
    /// Queues mono samples. Returns how many were accepted.
    pub fn push(&mut self, samples: &[f32]) -> usize {
        let pushed = self.producer.push_slice(samples);
        if pushed < samples.len() {
            self.dropped.fetch_add(samples.len() - pushed, Ordering::Relaxed);
        }
        pushed
    }

    /// Queues one channel out of an interleaved buffer.
    pub fn push_channel(&mut self, interleaved: &[f32], channels: usize, channel: usize) -> usize {
        if channels == 0 || channel >= channels {
            return 0;
        }
        let mut pushed = 0;
        let mut dropped = 0;
        for frame in interleaved.chunks_exact(channels) {
            match self.producer.try_push(frame[channel]) {
                Ok(()) => pushed += 1,
                Err(_) => dropped += 1,
            }
        }
        if dropped > 0 {
            self.dropped.fetch_add(dropped, Ordering::Relaxed);
        }
        pushed
    }
}

impl CaptureReader {
    /// Samples waiting in the queue.
    pub fn available(&self) -> usize {
        self.consumer.occupied_len()
    }

    /// Total samples dropped by the writer because the queue was full.
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Moves the next full window into `buffer`. Leaves both untouched and
    /// returns `false` while fewer than `buffer.capacity()` samples are queued.
    ///
    /// `buffer` must not be larger than the queue itself; size it with the
    /// `window_len` given to [`capture_queue`].
    pub fn next_window(&mut self, buffer: &mut SampleBuffer) -> bool {
        debug_assert!(
            buffer.capacity() <= self.capacity,
            "window of {} samples can never fill from a queue of {}",
            buffer.capacity(),
            self.capacity
        );
        if buffer.capacity() == 0 || self.available() < buffer.capacity() {
            return false;
        }
        let taken = self.consumer.pop_slice(buffer.as_mut_slice());
        debug_assert_eq!(taken, buffer.capacity());
        true
    }
}
