// src/hardware/subscriber.rs
// Inbound adapters: the single-slot hit latch fed by the IR receiver thread, and a
// channel-backed vision source fed by the camera thread.

use super::{HitSensor, SensorError, VisionSource};
use crate::core::Frame;
use log::{error, info, warn};
use std::io::{self, BufRead};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Write side of the pending-hit flag; cheap to clone into interrupt handlers or threads
#[derive(Clone, Debug)]
pub struct HitTrigger {
    pending: Arc<AtomicBool>,
}

impl HitTrigger {
    /// Marks a hit as pending. Repeated signals before the next drain collapse into one.
    pub fn signal(&self) {
        self.pending.store(true, Ordering::Release);
    }
}

/// Read side of the pending-hit flag, drained once per control cycle
#[derive(Debug)]
pub struct HitLatch {
    pending: Arc<AtomicBool>,
}

impl HitLatch {
    /// Empty latch and a trigger that sets it
    pub fn new() -> (Self, HitTrigger) {
        let pending = Arc::new(AtomicBool::new(false));
        let trigger = HitTrigger {
            pending: pending.clone(),
        };
        (HitLatch { pending }, trigger)
    }

    /// Another write handle onto the same slot
    pub fn trigger(&self) -> HitTrigger {
        HitTrigger {
            pending: self.pending.clone(),
        }
    }
}

impl HitSensor for HitLatch {
    fn poll_hit(&mut self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }
}

/// Reads IR codes line by line and signals a hit for each non-empty one.
/// The thread ends when the stream closes or fails.
pub fn spawn_hit_listener<R>(reader: R, trigger: HitTrigger) -> io::Result<JoinHandle<()>>
where
    R: BufRead + Send + 'static,
{
    thread::Builder::new()
        .name("ir-hit-listener".to_string())
        .spawn(move || {
            for line in reader.lines() {
                match line {
                    Ok(code) => {
                        let code = code.trim();
                        if code.is_empty() {
                            continue;
                        }
                        info!("Got IR code {}", code);
                        trigger.signal();
                    }
                    Err(e) => {
                        error!("IR receiver read failed: {}", e);
                        return;
                    }
                }
            }
            warn!("IR receiver stream closed");
        })
}

/// Vision source fed by a camera thread over a channel
pub struct ChannelVision {
    frames: Receiver<Frame>,
}

impl ChannelVision {
    /// Vision source and the sender the camera thread feeds
    pub fn new() -> (Self, Sender<Frame>) {
        let (sender, frames) = mpsc::channel();
        (ChannelVision { frames }, sender)
    }

    /// Vision source over an existing frame channel
    pub fn from_receiver(frames: Receiver<Frame>) -> Self {
        ChannelVision { frames }
    }
}

impl VisionSource for ChannelVision {
    fn poll_frame(&mut self, timeout: Duration) -> Result<Frame, SensorError> {
        let mut latest = match self.frames.recv_timeout(timeout) {
            Ok(frame) => frame,
            Err(RecvTimeoutError::Timeout) => return Err(SensorError::Timeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => {
                return Err(SensorError::Disconnected(
                    "camera frame channel closed".to_string(),
                ));
            }
        };
        // Only the newest frame matters; older ones are stale by now
        while let Ok(newer) = self.frames.try_recv() {
            latest = newer;
        }
        Ok(latest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Detection;
    use std::io::Cursor;

    #[test]
    fn latch_holds_a_single_pending_hit() {
        let (mut latch, trigger) = HitLatch::new();
        assert!(!latch.poll_hit());

        trigger.signal();
        trigger.signal();
        assert!(latch.poll_hit());
        assert!(!latch.poll_hit());
    }

    #[test]
    fn listener_signals_on_ir_codes() {
        let (mut latch, trigger) = HitLatch::new();
        let reader = Cursor::new("58391E4E\n\n");
        spawn_hit_listener(reader, trigger).unwrap().join().unwrap();
        assert!(latch.poll_hit());
    }

    #[test]
    fn listener_ignores_blank_lines() {
        let (mut latch, trigger) = HitLatch::new();
        spawn_hit_listener(Cursor::new("\n  \n"), trigger)
            .unwrap()
            .join()
            .unwrap();
        assert!(!latch.poll_hit());
    }

    #[test]
    fn channel_vision_keeps_newest_frame() {
        let (mut vision, sender) = ChannelVision::new();
        sender.send(Frame::empty()).unwrap();
        sender
            .send(Frame::new(vec![Detection::new(1, 10.0, 10.0, 5.0, 5.0)]))
            .unwrap();

        let frame = vision.poll_frame(Duration::from_millis(5)).unwrap();
        assert_eq!(frame.len(), 1);
    }

    #[test]
    fn channel_vision_reports_timeout_and_disconnect() {
        let (mut vision, sender) = ChannelVision::new();
        let timeout = Duration::from_millis(1);
        assert_eq!(vision.poll_frame(timeout), Err(SensorError::Timeout(timeout)));

        drop(sender);
        assert!(matches!(
            vision.poll_frame(timeout),
            Err(SensorError::Disconnected(_))
        ));
    }
}
