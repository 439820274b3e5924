//! Where published frames go.

use std::sync::mpsc::Sender;
use std::sync::{Arc, RwLock};

use facetrack_expression::UnifiedExpressionFrame;

/// Receives every frame the poll loop publishes, in order.
///
/// Each call carries a complete frame that replaces whatever the sink held
/// before.
pub trait ExpressionSink: Send {
    fn publish(&mut self, frame: &UnifiedExpressionFrame);
}

impl<F> ExpressionSink for F
where
    F: FnMut(&UnifiedExpressionFrame) + Send,
{
    fn publish(&mut self, frame: &UnifiedExpressionFrame) {
        self(frame)
    }
}

/// A sink that forwards frames over a channel.
///
/// Frames published after the receiver is dropped are discarded.
pub fn channel_sink(
    tx: Sender<UnifiedExpressionFrame>,
) -> impl FnMut(&UnifiedExpressionFrame) + Send {
    move |frame: &UnifiedExpressionFrame| {
        let _ = tx.send(*frame);
    }
}

/// The latest frame, shared with readers on other threads.
///
/// Writes replace the whole frame; readers never see a half-written one.
#[derive(Debug, Clone, Default)]
pub struct SharedExpressionFrame {
    inner: Arc<RwLock<UnifiedExpressionFrame>>,
}

impl SharedExpressionFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the most recently published frame.
    pub fn latest(&self) -> UnifiedExpressionFrame {
        match self.inner.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

impl ExpressionSink for SharedExpressionFrame {
    fn publish(&mut self, frame: &UnifiedExpressionFrame) {
        match self.inner.write() {
            Ok(mut guard) => *guard = *frame,
            Err(poisoned) => *poisoned.into_inner() = *frame,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facetrack_expression::UnifiedShape;
    use std::sync::mpsc;

    fn frame_with_jaw(value: f32) -> UnifiedExpressionFrame {
        let mut frame = UnifiedExpressionFrame::default();
        frame.shapes.set(UnifiedShape::JawOpen, value);
        frame
    }

    #[test]
    fn shared_frame_is_last_write_wins() {
        let shared = SharedExpressionFrame::new();
        let mut writer = shared.clone();

        writer.publish(&frame_with_jaw(0.25));
        writer.publish(&frame_with_jaw(0.75));

        assert_eq!(shared.latest().shapes.get(UnifiedShape::JawOpen), 0.75);
    }

    #[test]
    fn closures_are_sinks() {
        let mut seen = Vec::new();
        {
            let mut sink = |frame: &UnifiedExpressionFrame| {
                seen.push(frame.shapes.get(UnifiedShape::JawOpen));
            };
            sink.publish(&frame_with_jaw(0.5));
            sink.publish(&frame_with_jaw(1.0));
        }
        assert_eq!(seen, vec![0.5, 1.0]);
    }

    #[test]
    fn channel_sink_forwards_and_tolerates_closed_receiver() {
        let (tx, rx) = mpsc::channel();
        let mut sink = channel_sink(tx);
        sink.publish(&frame_with_jaw(0.5));
        assert_eq!(rx.recv().unwrap().shapes.get(UnifiedShape::JawOpen), 0.5);

        drop(rx);
        sink.publish(&frame_with_jaw(0.5));
    }
}
