// core/perception.rs

// Turns raw camera blocks into a single tracked target. Each detection is checked
// against the frame geometry, the hostile block worth chasing is picked, and the
// tracked target survives short occlusions until the loss timeout runs out.

// Dependencies
use log::{debug, info, warn};
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Camera signature identifier assigned during calibration
pub type SignatureId = u16;

/// One sighting of a signature in a single camera poll
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Calibrated color signature
    pub signature_id: SignatureId,
    /// Pixels from the left edge
    pub center_x: f64,
    /// Pixels from the top edge
    pub center_y: f64,
    /// Block width in pixels; used as apparent size
    pub width: f64,
    /// Block height in pixels
    pub height: f64,
}

impl Detection {
    /// A detection as reported by the camera
    pub fn new(
        signature_id: SignatureId,
        center_x: f64,
        center_y: f64,
        width: f64,
        height: f64,
    ) -> Self {
        Detection {
            signature_id,
            center_x,
            center_y,
            width,
            height,
        }
    }

    /// Block centroid in pixels
    pub fn center(&self) -> Vector2<f64> {
        Vector2::new(self.center_x, self.center_y)
    }

    /// Block area in square pixels
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Apparent size used for range decisions. Block width grows as the robot closes in.
    pub fn size(&self) -> f64 {
        self.width
    }

    /// Checks the block is something the camera could actually have reported
    pub fn validate(&self, geometry: &FrameGeometry) -> Result<(), DetectionError> {
        let fields = [self.center_x, self.center_y, self.width, self.height];
        if fields.iter().any(|v| !v.is_finite()) {
            return Err(DetectionError::NonFinite(self.signature_id));
        }
        if self.width <= 0.0 || self.height <= 0.0 {
            return Err(DetectionError::EmptyExtent {
                signature_id: self.signature_id,
                width: self.width,
                height: self.height,
            });
        }
        if !geometry.contains(self.center_x, self.center_y) {
            return Err(DetectionError::OutOfFrame {
                signature_id: self.signature_id,
                center_x: self.center_x,
                center_y: self.center_y,
            });
        }
        Ok(())
    }
}

/// Reasons a detection gets dropped from its frame
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionError {
    /// A coordinate or extent is NaN or infinite
    NonFinite(SignatureId),
    /// Zero or negative width/height
    EmptyExtent {
        /// Signature of the dropped block
        signature_id: SignatureId,
        /// Reported width
        width: f64,
        /// Reported height
        height: f64,
    },
    /// Centroid lies outside the camera frame
    OutOfFrame {
        /// Signature of the dropped block
        signature_id: SignatureId,
        /// Reported horizontal center
        center_x: f64,
        /// Reported vertical center
        center_y: f64,
    },
}

impl fmt::Display for DetectionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DetectionError::NonFinite(sig) => {
                write!(f, "signature {} has non-finite fields", sig)
            }
            DetectionError::EmptyExtent {
                signature_id,
                width,
                height,
            } => write!(
                f,
                "signature {} has empty extent {}x{}",
                signature_id, width, height
            ),
            DetectionError::OutOfFrame {
                signature_id,
                center_x,
                center_y,
            } => write!(
                f,
                "signature {} centered outside frame at ({}, {})",
                signature_id, center_x, center_y
            ),
        }
    }
}

impl std::error::Error for DetectionError {}

/// Camera image dimensions in pixels
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FrameGeometry {
    /// Image width in pixels
    pub width: f64,
    /// Image height in pixels
    pub height: f64,
}

impl Default for FrameGeometry {
    fn default() -> Self {
        // Pixy block coordinates span 0..=319 x 0..=199
        FrameGeometry {
            width: 320.0,
            height: 200.0,
        }
    }
}

impl FrameGeometry {
    /// Center pixel of the image
    pub fn center(&self) -> Vector2<f64> {
        Vector2::new(self.width / 2.0, self.height / 2.0)
    }

    /// True if the point lies inside the image, edges included
    pub fn contains(&self, x: f64, y: f64) -> bool {
        (0.0..=self.width).contains(&x) && (0.0..=self.height).contains(&y)
    }
}

/// All detections delivered by one camera poll
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    detections: Vec<Detection>,
}

impl Frame {
    /// Frame holding the given detections
    pub fn new(detections: Vec<Detection>) -> Self {
        Frame { detections }
    }

    /// Frame with no detections
    pub fn empty() -> Self {
        Frame::default()
    }

    /// Adds a detection
    pub fn push(&mut self, detection: Detection) {
        self.detections.push(detection);
    }

    /// Detections in camera order
    pub fn detections(&self) -> &[Detection] {
        &self.detections
    }

    /// Number of detections
    pub fn len(&self) -> usize {
        self.detections.len()
    }

    /// True if nothing was detected
    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    /// Drops malformed detections and returns how many were removed
    pub fn sanitize(&mut self, geometry: &FrameGeometry) -> usize {
        let before = self.detections.len();
        self.detections.retain(|d| match d.validate(geometry) {
            Ok(()) => true,
            Err(e) => {
                warn!("Dropping malformed detection: {}", e);
                false
            }
        });
        before - self.detections.len()
    }
}

impl From<Vec<Detection>> for Frame {
    fn from(detections: Vec<Detection>) -> Self {
        Frame::new(detections)
    }
}

impl FromIterator<Detection> for Frame {
    fn from_iter<I: IntoIterator<Item = Detection>>(iter: I) -> Self {
        Frame::new(iter.into_iter().collect())
    }
}

/// The block currently being pursued, kept across cycles with a loss grace period
#[derive(Clone, Debug, PartialEq)]
pub struct TrackedTarget {
    /// Signature being pursued
    pub signature_id: SignatureId,
    /// Centroid at the last sighting
    pub last_known_center: Vector2<f64>,
    /// Apparent size (width) at the last sighting
    pub last_known_size: f64,
    /// Cycle of the last sighting
    pub last_seen_cycle: u64,
}

impl TrackedTarget {
    /// Starts tracking from a fresh sighting
    pub fn from_detection(detection: &Detection, cycle: u64) -> Self {
        TrackedTarget {
            signature_id: detection.signature_id,
            last_known_center: detection.center(),
            last_known_size: detection.size(),
            last_seen_cycle: cycle,
        }
    }

    fn refresh(&mut self, detection: &Detection, cycle: u64) {
        self.last_known_center = detection.center();
        self.last_known_size = detection.size();
        self.last_seen_cycle = cycle;
    }

    /// Horizontal position at the last sighting
    pub fn center_x(&self) -> f64 {
        self.last_known_center.x
    }

    /// Cycles elapsed since the target was last matched
    pub fn cycles_unseen(&self, cycle: u64) -> u64 {
        cycle.saturating_sub(self.last_seen_cycle)
    }
}

/// How competing hostile blocks are ranked when acquiring a target
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Biggest block wins (closest / most confident)
    #[default]
    LargestArea,
    /// Area divided by pixel distance from the frame center
    AreaOverDistance,
}

/// Chooses which detection, if any, is the active target
pub struct TargetSelector {
    hostile_signature: SignatureId,
    loss_timeout_cycles: u64,
    policy: SelectionPolicy,
    geometry: FrameGeometry,
    tracked: Option<TrackedTarget>,
}

impl TargetSelector {
    /// Selector for one hostile signature with the given loss timeout and ranking
    pub fn new(
        hostile_signature: SignatureId,
        loss_timeout_cycles: u64,
        policy: SelectionPolicy,
        geometry: FrameGeometry,
    ) -> Self {
        TargetSelector {
            hostile_signature,
            loss_timeout_cycles,
            policy,
            geometry,
            tracked: None,
        }
    }

    /// Refreshes, acquires, ages out or keeps the tracked target for this cycle's frame
    pub fn update(&mut self, frame: &Frame, cycle: u64) -> Option<&TrackedTarget> {
        if let Some(signature) = self.tracked.as_ref().map(|t| t.signature_id) {
            if let Some(detection) = self.best_candidate(frame, signature) {
                if let Some(target) = self.tracked.as_mut() {
                    target.refresh(&detection, cycle);
                }
            } else {
                let unseen = self
                    .tracked
                    .as_ref()
                    .map_or(0, |t| t.cycles_unseen(cycle));
                if unseen > self.loss_timeout_cycles {
                    info!(
                        "Lost signature {} after {} cycles unseen",
                        signature, unseen
                    );
                    self.tracked = None;
                } else {
                    debug!("Signature {} occluded for {} cycles", signature, unseen);
                }
            }
        } else if let Some(detection) = self.best_candidate(frame, self.hostile_signature) {
            info!(
                "Acquired signature {} at x={} (width {})",
                detection.signature_id, detection.center_x, detection.width
            );
            self.tracked = Some(TrackedTarget::from_detection(&detection, cycle));
        }

        self.tracked.as_ref()
    }

    /// Currently tracked target, if any
    pub fn tracked(&self) -> Option<&TrackedTarget> {
        self.tracked.as_ref()
    }

    /// Forgets the current target without waiting for the loss timeout
    pub fn clear(&mut self) {
        if let Some(target) = self.tracked.take() {
            info!("Dropped track on signature {}", target.signature_id);
        }
    }

    fn best_candidate(&self, frame: &Frame, signature: SignatureId) -> Option<Detection> {
        frame
            .detections()
            .iter()
            .filter(|d| d.signature_id == signature)
            .copied()
            .min_by(|a, b| self.rank(a, b))
    }

    // Less means `a` is the better target
    fn rank(&self, a: &Detection, b: &Detection) -> Ordering {
        self.score(b)
            .total_cmp(&self.score(a))
            .then(a.signature_id.cmp(&b.signature_id))
            .then(a.center_x.total_cmp(&b.center_x))
    }

    fn score(&self, detection: &Detection) -> f64 {
        match self.policy {
            SelectionPolicy::LargestArea => detection.area(),
            SelectionPolicy::AreaOverDistance => {
                let distance = (detection.center() - self.geometry.center()).norm();
                // A dead-centered block would divide by zero
                detection.area() / distance.max(1.0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn selector(loss_timeout: u64) -> TargetSelector {
        TargetSelector::new(1, loss_timeout, SelectionPolicy::LargestArea, FrameGeometry::default())
    }

    fn block(sig: SignatureId, x: f64, width: f64) -> Detection {
        Detection::new(sig, x, 100.0, width, width)
    }

    #[test]
    fn acquires_largest_hostile_block() {
        let mut selector = selector(3);
        let frame = Frame::new(vec![
            block(1, 50.0, 10.0),
            block(1, 200.0, 30.0),
            block(2, 100.0, 90.0),
        ]);

        let target = selector.update(&frame, 1).cloned().unwrap();
        assert_eq!(target.signature_id, 1);
        assert_eq!(target.center_x(), 200.0);
        assert_eq!(target.last_known_size, 30.0);
    }

    #[test]
    fn ignores_frames_without_hostile_signature() {
        let mut selector = selector(3);
        let frame = Frame::new(vec![block(2, 100.0, 50.0), block(3, 150.0, 60.0)]);
        assert!(selector.update(&frame, 1).is_none());
    }

    #[test]
    fn refreshes_position_and_cycle_when_matched() {
        let mut selector = selector(3);
        selector.update(&Frame::new(vec![block(1, 100.0, 20.0)]), 1);
        let target = selector
            .update(&Frame::new(vec![block(1, 140.0, 26.0)]), 2)
            .cloned()
            .unwrap();

        assert_eq!(target.center_x(), 140.0);
        assert_eq!(target.last_known_size, 26.0);
        assert_eq!(target.last_seen_cycle, 2);
    }

    #[test]
    fn keeps_target_through_short_occlusion_then_clears() {
        let mut selector = selector(3);
        selector.update(&Frame::new(vec![block(1, 100.0, 20.0)]), 1);

        for cycle in 2..=4 {
            let target = selector.update(&Frame::empty(), cycle).cloned().unwrap();
            assert_eq!(target.last_seen_cycle, 1);
        }
        assert!(selector.update(&Frame::empty(), 5).is_none());
    }

    #[rstest]
    #[case::leftmost_wins(
        vec![block(1, 220.0, 20.0), block(1, 60.0, 20.0), block(1, 140.0, 20.0)],
        60.0
    )]
    #[case::area_beats_position(vec![block(1, 10.0, 20.0), block(1, 300.0, 21.0)], 300.0)]
    fn tie_break_is_deterministic(#[case] detections: Vec<Detection>, #[case] expected_x: f64) {
        let mut selector = selector(3);
        let target = selector.update(&Frame::new(detections), 1).cloned().unwrap();
        assert_eq!(target.center_x(), expected_x);
    }

    #[test]
    fn equal_area_prefers_lowest_signature() {
        let selector = selector(3);
        let a = block(4, 200.0, 20.0);
        let b = block(2, 250.0, 20.0);
        assert_eq!(selector.rank(&b, &a), Ordering::Less);
    }

    #[test]
    fn area_over_distance_prefers_centered_block() {
        let mut selector = TargetSelector::new(
            1,
            3,
            SelectionPolicy::AreaOverDistance,
            FrameGeometry::default(),
        );
        let frame = Frame::new(vec![block(1, 10.0, 30.0), block(1, 165.0, 25.0)]);
        let target = selector.update(&frame, 1).cloned().unwrap();
        assert_eq!(target.center_x(), 165.0);
    }

    #[test]
    fn sanitize_drops_malformed_detections() {
        let geometry = FrameGeometry::default();
        let mut frame = Frame::new(vec![
            block(1, 100.0, 20.0),
            Detection::new(1, f64::NAN, 10.0, 5.0, 5.0),
            Detection::new(1, 100.0, 10.0, 0.0, 5.0),
            Detection::new(1, 400.0, 10.0, 5.0, 5.0),
        ]);

        assert_eq!(frame.sanitize(&geometry), 3);
        assert_eq!(frame.len(), 1);
    }

    #[test]
    fn clear_forgets_target() {
        let mut selector = selector(10);
        selector.update(&Frame::new(vec![block(1, 100.0, 20.0)]), 1);
        selector.clear();
        assert!(selector.tracked().is_none());
    }
}
