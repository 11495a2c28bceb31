//! Feature station: landmark frames in, ready windows out.

use crate::features::buffer::FeatureExtractionBuffer;
use crate::features::hands_down::HandsDownDetector;
use crate::features::landmarks::LandmarkFrame;
use crate::pipeline::error::StationError;
use crate::pipeline::outlet::{SequenceOutlet, lock};
use crate::pipeline::station::Station;
use crate::pipeline::types::ReadyWindow;
use std::sync::{Arc, Mutex};

/// Pushes frames into the shared window and forwards it once ready.
///
/// Also watches for the hands-down gesture and the accumulator's idle
/// timeout, both of which are driven by frame timestamps.
pub struct FeatureStation {
    buffer: Arc<Mutex<FeatureExtractionBuffer>>,
    outlet: Option<SequenceOutlet>,
    hands_down: Option<HandsDownDetector>,
    frames: u64,
}

impl FeatureStation {
    pub fn new(buffer: Arc<Mutex<FeatureExtractionBuffer>>) -> Self {
        Self {
            buffer,
            outlet: None,
            hands_down: None,
            frames: 0,
        }
    }

    /// Commit and tick the accumulator behind `outlet`.
    pub fn with_outlet(mut self, outlet: SequenceOutlet) -> Self {
        self.outlet = Some(outlet);
        self
    }

    /// Commit the sequence when both hands rest below the frame.
    pub fn with_hands_down(mut self, detector: HandsDownDetector) -> Self {
        self.hands_down = Some(detector);
        self
    }

    fn drive_accumulator(&mut self, frame: &LandmarkFrame) {
        let Some(outlet) = &self.outlet else {
            return;
        };
        if let Some(detector) = self.hands_down.as_mut()
            && detector.check(frame)
        {
            tracing::debug!(timestamp_ms = frame.timestamp_ms, "hands down, committing");
            outlet.commit(frame.timestamp_ms);
            return;
        }
        outlet.tick(frame.timestamp_ms);
    }
}

impl Station for FeatureStation {
    type Input = LandmarkFrame;
    type Output = ReadyWindow;

    fn name(&self) -> &'static str {
        "features"
    }

    fn process(&mut self, frame: LandmarkFrame) -> Result<Option<ReadyWindow>, StationError> {
        self.frames += 1;
        self.drive_accumulator(&frame);

        let tensor = {
            let mut buffer = lock(&self.buffer);
            buffer.push_frame(&frame);
            buffer.ready_tensor()
        };

        Ok(tensor.map(|tensor| ReadyWindow {
            tensor,
            timestamp_ms: frame.timestamp_ms,
        }))
    }

    fn shutdown(&mut self) {
        tracing::debug!(frames = self.frames, "feature station finished");
    }
}
