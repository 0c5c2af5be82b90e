//! Connection transport abstraction.
//!
//! The registry owns connections only through the [`ConnectionSink`] trait,
//! allowing different transports (WebSocket, TCP, in-process for testing)
//! behind the same registry and broadcaster.

use crate::error::{ServerError, ServerResult};
use driftsync_protocol::ServerFrame;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

/// Outbound half of a live connection.
pub trait ConnectionSink: Send + Sync {
    /// Sends a frame to the peer.
    fn send(&self, frame: &ServerFrame) -> ServerResult<()>;

    /// Closes the connection.
    fn close(&self) -> ServerResult<()>;

    /// Returns true if the connection is still open.
    fn is_open(&self) -> bool;
}

/// A sink backed by an unbounded channel to the connection's writer task.
///
/// The receiving half is handed to whatever task owns the actual socket;
/// frames are encoded before queueing so the writer only moves strings.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<String>,
    open: AtomicBool,
}

impl ChannelSink {
    /// Creates a sink and the receiving end for the writer task.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = Self {
            tx,
            open: AtomicBool::new(true),
        };
        (sink, rx)
    }
}

impl ConnectionSink for ChannelSink {
    fn send(&self, frame: &ServerFrame) -> ServerResult<()> {
        if !self.is_open() {
            return Err(ServerError::Transport("connection closed".into()));
        }
        self.tx.send(frame.encode()).map_err(|_| {
            self.open.store(false, Ordering::SeqCst);
            ServerError::Transport("writer task gone".into())
        })
    }

    fn close(&self) -> ServerResult<()> {
        self.open.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst) && !self.tx.is_closed()
    }
}

/// A sink that records frames for assertions.
///
/// Can be switched into a failing state to exercise dead-connection paths.
pub struct RecordingSink {
    frames: Mutex<Vec<ServerFrame>>,
    failing: AtomicBool,
    open: AtomicBool,
}

impl RecordingSink {
    /// Creates a new recording sink.
    pub fn new() -> Self {
        Self {
            frames: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
            open: AtomicBool::new(true),
        }
    }

    /// Returns a copy of every frame sent so far.
    pub fn frames(&self) -> Vec<ServerFrame> {
        self.frames.lock().clone()
    }

    /// Returns the number of frames sent so far.
    pub fn frame_count(&self) -> usize {
        self.frames.lock().len()
    }

    /// Makes every subsequent send and close fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionSink for RecordingSink {
    fn send(&self, frame: &ServerFrame) -> ServerResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ServerError::Transport("simulated send failure".into()));
        }
        if !self.is_open() {
            return Err(ServerError::Transport("connection closed".into()));
        }
        self.frames.lock().push(frame.clone());
        Ok(())
    }

    fn close(&self) -> ServerResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ServerError::Transport("simulated close failure".into()));
        }
        self.open.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_sink_delivers_encoded_frames() {
        let (sink, mut rx) = ChannelSink::new();
        sink.send(&ServerFrame::Pong { timestamp: 5 }).unwrap();

        let raw = rx.try_recv().unwrap();
        assert!(raw.contains("pong"));
    }

    #[test]
    fn channel_sink_send_after_close_errors() {
        let (sink, _rx) = ChannelSink::new();
        sink.close().unwrap();

        let result = sink.send(&ServerFrame::Pong { timestamp: 5 });
        assert!(matches!(result, Err(ServerError::Transport(_))));
        assert!(!sink.is_open());
    }

    #[test]
    fn channel_sink_detects_dropped_receiver() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);

        assert!(!sink.is_open());
        let result = sink.send(&ServerFrame::Pong { timestamp: 5 });
        assert!(result.is_err());
    }

    #[test]
    fn recording_sink_captures_frames() {
        let sink = RecordingSink::new();
        sink.send(&ServerFrame::Pong { timestamp: 1 }).unwrap();
        sink.send(&ServerFrame::error("nope")).unwrap();

        let frames = sink.frames();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1], ServerFrame::Error("nope".into()));
    }

    #[test]
    fn recording_sink_failure_mode() {
        let sink = RecordingSink::new();
        sink.set_failing(true);

        assert!(sink.send(&ServerFrame::Pong { timestamp: 1 }).is_err());
        assert!(sink.close().is_err());
        assert_eq!(sink.frame_count(), 0);
    }
}
