use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::shared::frame::Frame;

/// Result of [`FrameBuffer::take_latest`].
#[derive(Debug)]
pub enum Take {
    Frame(Frame),
    /// Nothing new arrived within the timeout.
    Timeout,
    /// The producer is gone and the slot is empty.
    Closed,
}

/// Single-slot hand-off from the capture thread to the pipeline thread.
///
/// Publishing overwrites any frame the consumer has not taken yet, so the
/// consumer always works on the freshest frame and the producer never
/// blocks. Overwritten frames, and frames not newer than the pending or last
/// taken one, are counted as dropped.
pub struct FrameBuffer {
    slot: Mutex<Slot>,
    available: Condvar,
    dropped: AtomicU64,
}

#[derive(Default)]
struct Slot {
    latest: Option<Frame>,
    last_taken: Option<u64>,
    closed: bool,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot::default()),
            available: Condvar::new(),
            dropped: AtomicU64::new(0),
        }
    }

    /// Offers a frame to the consumer. Returns `false` if the frame was
    /// discarded because the buffer is closed or the frame is stale.
    pub fn publish(&self, frame: Frame) -> bool {
        let mut slot = self.lock();
        if slot.closed {
            return false;
        }
        let pending = slot.latest.as_ref().map(Frame::sequence);
        if slot
            .last_taken
            .max(pending)
            .is_some_and(|newest| frame.sequence() <= newest)
        {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        if slot.latest.replace(frame).is_some() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        drop(slot);
        self.available.notify_one();
        true
    }

    /// Takes the newest untaken frame, waiting up to `timeout` for one.
    pub fn take_latest(&self, timeout: Duration) -> Take {
        let deadline = Instant::now() + timeout;
        let mut slot = self.lock();
        loop {
            if let Some(frame) = slot.latest.take() {
                slot.last_taken = Some(frame.sequence());
                return Take::Frame(frame);
            }
            if slot.closed {
                return Take::Closed;
            }
            let now = Instant::now();
            if now >= deadline {
                return Take::Timeout;
            }
            slot = self
                .available
                .wait_timeout(slot, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Marks the producer as finished. A frame already in the slot can
    /// still be taken; after that, `take_latest` returns `Closed`.
    pub fn close(&self) {
        self.lock().closed = true;
        self.available.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::frame::PixelFormat;
    use std::sync::Arc;
    use std::thread;

    fn frame(sequence: u64) -> Frame {
        Frame::new(vec![0u8; 3], 1, 1, PixelFormat::Rgb24, sequence)
    }

    fn taken(take: Take) -> u64 {
        match take {
            Take::Frame(f) => f.sequence(),
            other => panic!("expected a frame, got {other:?}"),
        }
    }

    #[test]
    fn test_take_returns_latest_and_counts_overwrites() {
        let buffer = FrameBuffer::new();
        buffer.publish(frame(1));
        buffer.publish(frame(2));
        buffer.publish(frame(3));

        assert_eq!(taken(buffer.take_latest(Duration::ZERO)), 3);
        assert_eq!(buffer.dropped_count(), 2);
    }

    #[test]
    fn test_frame_is_taken_only_once() {
        let buffer = FrameBuffer::new();
        buffer.publish(frame(1));
        taken(buffer.take_latest(Duration::ZERO));
        assert!(matches!(
            buffer.take_latest(Duration::from_millis(10)),
            Take::Timeout
        ));
    }

    #[test]
    fn test_stale_frame_rejected_after_newer_taken() {
        let buffer = FrameBuffer::new();
        buffer.publish(frame(5));
        taken(buffer.take_latest(Duration::ZERO));

        assert!(!buffer.publish(frame(4)));
        assert!(!buffer.publish(frame(5)));
        assert!(buffer.publish(frame(6)));
        assert_eq!(taken(buffer.take_latest(Duration::ZERO)), 6);
        assert_eq!(buffer.dropped_count(), 2);
    }

    #[test]
    fn test_older_frame_does_not_replace_newer_pending_frame() {
        let buffer = FrameBuffer::new();
        assert!(buffer.publish(frame(10)));
        assert!(!buffer.publish(frame(5)));
        assert!(!buffer.publish(frame(10)));

        assert_eq!(taken(buffer.take_latest(Duration::ZERO)), 10);
        assert_eq!(buffer.dropped_count(), 2);
    }

    #[test]
    fn test_close_drains_pending_frame_then_reports_closed() {
        let buffer = FrameBuffer::new();
        buffer.publish(frame(1));
        buffer.close();

        assert!(!buffer.publish(frame(2)));
        assert_eq!(taken(buffer.take_latest(Duration::ZERO)), 1);
        assert!(matches!(buffer.take_latest(Duration::from_secs(5)), Take::Closed));
    }

    #[test]
    fn test_close_wakes_waiting_consumer() {
        let buffer = Arc::new(FrameBuffer::new());
        let consumer = {
            let buffer = buffer.clone();
            thread::spawn(move || buffer.take_latest(Duration::from_secs(10)))
        };
        thread::sleep(Duration::from_millis(20));
        buffer.close();
        assert!(matches!(consumer.join().unwrap(), Take::Closed));
    }

    #[test]
    fn test_concurrent_consumer_never_goes_backwards() {
        let buffer = Arc::new(FrameBuffer::new());
        let producer = {
            let buffer = buffer.clone();
            thread::spawn(move || {
                for seq in 0..2000 {
                    buffer.publish(frame(seq));
                }
                buffer.close();
            })
        };

        let mut last: Option<u64> = None;
        let mut received = 0u64;
        loop {
            match buffer.take_latest(Duration::from_millis(100)) {
                Take::Frame(f) => {
                    if let Some(prev) = last {
                        assert!(f.sequence() > prev);
                    }
                    last = Some(f.sequence());
                    received += 1;
                }
                Take::Timeout => continue,
                Take::Closed => break,
            }
        }
        producer.join().unwrap();

        assert_eq!(last, Some(1999));
        assert_eq!(received + buffer.dropped_count(), 2000);
    }
}
