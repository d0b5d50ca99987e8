use std::time::Duration;

use crossbeam_channel::{Receiver, SendTimeoutError, Sender};

use crate::pipeline::domain::frame_sink::{FrameSink, Presented, StatusTag};
use crate::shared::frame::Frame;

/// A frame as delivered to the display side of a [`ChannelFrameSink`].
#[derive(Clone, Debug)]
pub struct PresentedFrame {
    pub frame: Frame,
    pub tag: StatusTag,
}

/// Presents frames into a bounded crossbeam channel. When the receiver
/// falls behind and the channel stays full for the whole timeout, the
/// presentation is dropped.
pub struct ChannelFrameSink {
    tx: Sender<PresentedFrame>,
}

impl ChannelFrameSink {
    pub fn bounded(capacity: usize) -> (Self, Receiver<PresentedFrame>) {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        (Self { tx }, rx)
    }
}

impl FrameSink for ChannelFrameSink {
    fn present(
        &mut self,
        frame: Frame,
        tag: StatusTag,
        timeout: Duration,
    ) -> Result<Presented, Box<dyn std::error::Error>> {
        match self.tx.send_timeout(PresentedFrame { frame, tag }, timeout) {
            Ok(()) => Ok(Presented::Shown),
            Err(SendTimeoutError::Timeout(_)) => Ok(Presented::Dropped),
            Err(SendTimeoutError::Disconnected(_)) => Err("presentation receiver disconnected".into()),
        }
    }
}
