//! Outbound frames to the exchange: subscriptions, pings, pongs.
//!
//! Frames are queued on two bounded lanes and written by the
//! [`SocketWriter`] agent. Control frames are written before data frames
//! queued earlier, so a keep-alive never waits behind a burst of requests.

use super::error::{Lane, WriterError};
use bytes::Bytes;
use crossbeam::queue::ArrayQueue;
use std::io;
use std::sync::Arc;
use tracing::trace;

/// Slots per lane unless configured otherwise.
pub const DEFAULT_LANE_CAPACITY: usize = 1 << 7;
/// Largest frame accepted unless configured otherwise.
pub const DEFAULT_MAX_FRAME_LEN: usize = 1 << 10;

/// Destination of outbound frames, usually the exchange socket.
pub trait FrameSink: Send + 'static {
    /// Writes one complete frame.
    ///
    /// # Errors
    /// Returns the underlying I/O error.
    fn write_frame(&mut self, frame: &[u8]) -> io::Result<()>;
}

#[derive(Debug)]
struct Lanes {
    data: ArrayQueue<Bytes>,
    control: ArrayQueue<Bytes>,
    max_frame_len: usize,
}

/// Producer handle for a [`SocketWriter`]. Cheap to clone; usable from any
/// thread.
#[derive(Debug, Clone)]
pub struct WriterHandle {
    lanes: Arc<Lanes>,
}

impl WriterHandle {
    /// Queues a data frame.
    ///
    /// # Errors
    /// [`WriterError::FrameTooLarge`] or [`WriterError::QueueFull`].
    pub fn enqueue(&self, frame: Bytes) -> Result<(), WriterError> {
        self.push(Lane::Data, frame)
    }

    /// Queues a control frame.
    ///
    /// # Errors
    /// [`WriterError::FrameTooLarge`] or [`WriterError::QueueFull`].
    pub fn enqueue_control(&self, frame: Bytes) -> Result<(), WriterError> {
        self.push(Lane::Control, frame)
    }

    /// True while either lane holds frames.
    pub fn has_pending(&self) -> bool {
        !self.lanes.data.is_empty() || !self.lanes.control.is_empty()
    }

    fn push(&self, lane: Lane, frame: Bytes) -> Result<(), WriterError> {
        if frame.len() > self.lanes.max_frame_len {
            return Err(WriterError::FrameTooLarge {
                len: frame.len(),
                limit: self.lanes.max_frame_len,
            });
        }
        let queue = match lane {
            Lane::Data => &self.lanes.data,
            Lane::Control => &self.lanes.control,
        };
        queue
            .push(frame)
            .map_err(|_| WriterError::QueueFull { lane })
    }
}

/// Writer agent draining both lanes into a [`FrameSink`].
#[derive(Debug)]
pub struct SocketWriter<K> {
    lanes: Arc<Lanes>,
    sink: K,
}

impl<K: FrameSink> SocketWriter<K> {
    /// Creates a writer with default lane capacity and frame limit.
    pub fn new(sink: K) -> (Self, WriterHandle) {
        Self::with_limits(sink, DEFAULT_LANE_CAPACITY, DEFAULT_MAX_FRAME_LEN)
    }

    /// Creates a writer with explicit limits. Zero capacities are rounded up
    /// to one.
    pub fn with_limits(
        sink: K,
        lane_capacity: usize,
        max_frame_len: usize,
    ) -> (Self, WriterHandle) {
        let lanes = Arc::new(Lanes {
            data: ArrayQueue::new(lane_capacity.max(1)),
            control: ArrayQueue::new(lane_capacity.max(1)),
            max_frame_len,
        });
        let handle = WriterHandle {
            lanes: Arc::clone(&lanes),
        };
        (Self { lanes, sink }, handle)
    }

    /// Sink the frames are written to.
    #[inline]
    pub fn sink(&self) -> &K {
        &self.sink
    }

    /// Writes every queued frame, control lane first. Returns the frame count.
    ///
    /// # Errors
    /// Returns [`WriterError::Io`] on the first failed write; the failed frame
    /// is dropped and the rest stay queued.
    pub fn do_work(&mut self) -> Result<usize, WriterError> {
        let mut written = 0;
        for lane in [Lane::Control, Lane::Data] {
            let queue = match lane {
                Lane::Data => &self.lanes.data,
                Lane::Control => &self.lanes.control,
            };
            while let Some(frame) = queue.pop() {
                self.sink.write_frame(&frame)?;
                trace!(%lane, len = frame.len(), "frame written");
                written += 1;
            }
        }
        Ok(written)
    }
}
