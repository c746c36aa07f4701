//! In-memory form of one sensor report.

use glam::Vec3;

/// Track identifier assigned by the sensor process.
///
/// Not unique across sensor restarts, and not deduplicated within a batch.
pub type DetectionId = i64;

/// Where a detection was observed, in the sensor's own space
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SensorPoint {
    /// 2D camera pixel, origin top-left, with optional depth reading
    Pixel { x: f32, y: f32, depth: Option<f32> },
    /// 3D depth-camera position in meters
    Metric(Vec3),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub id: DetectionId,
    pub point: SensorPoint,
}

impl Detection {
    pub fn pixel(id: DetectionId, x: f32, y: f32) -> Self {
        Detection {
            id,
            point: SensorPoint::Pixel { x, y, depth: None },
        }
    }

    pub fn pixel_with_depth(id: DetectionId, x: f32, y: f32, depth: f32) -> Self {
        Detection {
            id,
            point: SensorPoint::Pixel {
                x,
                y,
                depth: Some(depth),
            },
        }
    }

    pub fn metric(id: DetectionId, position: Vec3) -> Self {
        Detection {
            id,
            point: SensorPoint::Metric(position),
        }
    }
}

/// Everything decoded from a single datagram.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    /// Located detections in wire order
    pub detections: Vec<Detection>,
    /// Ids that were reported without a usable coordinate
    pub unlocated: Vec<DetectionId>,
}

impl Batch {
    pub fn new(detections: Vec<Detection>) -> Self {
        Batch {
            detections,
            unlocated: Vec::new(),
        }
    }

    /// Number of records reported, located or not
    pub fn len(&self) -> usize {
        self.detections.len() + self.unlocated.len()
    }

    pub fn located_len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty() && self.unlocated.is_empty()
    }

    /// Every id the sensor reported, located or not
    pub fn reported_ids(&self) -> impl Iterator<Item = DetectionId> + '_ {
        self.detections
            .iter()
            .map(|detection| detection.id)
            .chain(self.unlocated.iter().copied())
    }
}
