//! Wire decoder for tracking datagrams.
//!
//! Accepts a bare JSON array of detection records, or the same array wrapped
//! as `{"data": [...]}` / `{"tracks": [...]}`. Records carry either a 2D
//! `center` (pixels, optional `depth`) or a 3D `position` (meters).

use crate::detection::{Batch, Detection, DetectionId, SensorPoint};
use glam::Vec3;
use log::debug;
use serde::Deserialize;
use smallvec::SmallVec;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Payload is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("Malformed detection JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Empty payload")]
    EmptyPayload,
}

type Coords = SmallVec<[f64; 3]>;

#[derive(Deserialize, Debug)]
struct RawDetection {
    id: DetectionId,
    #[serde(default)]
    center: Option<Coords>,
    #[serde(default)]
    position: Option<Coords>,
    #[serde(default)]
    depth: Option<f64>,
}

#[derive(Deserialize, Debug)]
struct WrappedPayload {
    #[serde(alias = "tracks")]
    data: Vec<RawDetection>,
}

/// Narrow to `f32`, rejecting values that overflow it
fn finite(value: f64) -> Option<f32> {
    let narrowed = value as f32;
    narrowed.is_finite().then_some(narrowed)
}

impl RawDetection {
    fn point(&self) -> Option<SensorPoint> {
        if let Some(&[x, y, z]) = self.position.as_deref() {
            return Some(SensorPoint::Metric(Vec3::new(finite(x)?, finite(y)?, finite(z)?)));
        }
        match self.center.as_deref() {
            Some(&[x, y]) => Some(SensorPoint::Pixel {
                x: finite(x)?,
                y: finite(y)?,
                depth: self.depth.and_then(finite),
            }),
            _ => None,
        }
    }
}

/// Decode one datagram into a [`Batch`], preserving wire order.
///
/// Records without a usable coordinate land in [`Batch::unlocated`] instead
/// of failing the whole datagram.
pub fn decode_batch(payload: &[u8]) -> Result<Batch, DecodeError> {
    let text = std::str::from_utf8(payload)?.trim();
    if text.is_empty() {
        return Err(DecodeError::EmptyPayload);
    }

    let records: Vec<RawDetection> = if text.starts_with('[') {
        serde_json::from_str(text)?
    } else {
        serde_json::from_str::<WrappedPayload>(text)?.data
    };

    let mut batch = Batch {
        detections: Vec::with_capacity(records.len()),
        unlocated: Vec::new(),
    };
    for record in records {
        match record.point() {
            Some(point) => batch.detections.push(Detection { id: record.id, point }),
            None => {
                debug!("Detection {} has no usable coordinate, skipping placement", record.id);
                batch.unlocated.push(record.id);
            }
        }
    }
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_pixel_detections_in_order() {
        let batch = decode_batch(
            br#"[{"id":1,"center":[320,240],"depth":1.0},{"id":7,"center":[10.5,20]}]"#,
        )
        .unwrap();

        assert_eq!(
            batch.detections,
            vec![
                Detection::pixel_with_depth(1, 320.0, 240.0, 1.0),
                Detection::pixel(7, 10.5, 20.0),
            ]
        );
        assert!(batch.unlocated.is_empty());
    }

    #[test]
    fn decodes_metric_positions_and_null_readings() {
        let batch = decode_batch(
            br#"[{"id":3,"position":[0.5,-1.0,2.0]},{"id":4,"position":null},{"id":5}]"#,
        )
        .unwrap();

        assert_eq!(batch.detections, vec![Detection::metric(3, Vec3::new(0.5, -1.0, 2.0))]);
        assert_eq!(batch.unlocated, vec![4, 5]);
        assert_eq!(batch.reported_ids().collect::<Vec<_>>(), vec![3, 4, 5]);
    }

    #[test]
    fn wrong_length_coordinates_skip_only_that_detection() {
        let batch = decode_batch(
            br#"[{"id":1,"center":[5]},{"id":2,"center":[1,2]},{"id":3,"position":[1,2]}]"#,
        )
        .unwrap();

        assert_eq!(batch.detections, vec![Detection::pixel(2, 1.0, 2.0)]);
        assert_eq!(batch.unlocated, vec![1, 3]);
    }

    #[test]
    fn coordinates_overflowing_f32_are_unlocated() {
        let batch = decode_batch(
            br#"[{"id":1,"center":[1e39,10]},{"id":2,"position":[0.0,-1e300,1.0]},
                 {"id":3,"center":[4,5],"depth":1e40},{"id":4,"center":[-3.5e38,0]}]"#,
        )
        .unwrap();

        // An overflowing depth only drops the depth
        assert_eq!(batch.detections, vec![Detection::pixel(3, 4.0, 5.0)]);
        assert_eq!(batch.unlocated, vec![1, 2, 4]);
        assert_eq!(batch.located_len(), 1);
        assert_eq!(batch.len(), 4);
    }

    #[test]
    fn accepts_wrapped_roots() {
        let data = decode_batch(br#"{"data":[{"id":9,"center":[1,1]}]}"#).unwrap();
        let tracks = decode_batch(br#" {"tracks":[{"id":9,"center":[1,1]}]} "#).unwrap();
        assert_eq!(data, tracks);
        assert_eq!(data.located_len(), 1);
    }

    #[test]
    fn duplicate_ids_are_kept() {
        let batch = decode_batch(br#"[{"id":2,"center":[1,1]},{"id":2,"center":[3,3]}]"#).unwrap();
        assert_eq!(batch.located_len(), 2);
        assert_eq!(batch.detections[1], Detection::pixel(2, 3.0, 3.0));
    }

    #[test]
    fn empty_array_is_a_valid_empty_batch() {
        let batch = decode_batch(b"[]").unwrap();
        assert!(batch.is_empty());
    }

    #[test]
    fn malformed_payloads_are_errors() {
        assert!(matches!(decode_batch(br#"[{"id":1,"center":[3"#), Err(DecodeError::Json(_))));
        assert!(matches!(decode_batch(br#"[{"id":"one"}]"#), Err(DecodeError::Json(_))));
        assert!(matches!(decode_batch(br#"{"people":[]}"#), Err(DecodeError::Json(_))));
        assert!(matches!(decode_batch(b"  \n"), Err(DecodeError::EmptyPayload)));
        assert!(matches!(decode_batch(&[0xff, 0xfe, b'[']), Err(DecodeError::InvalidUtf8(_))));
    }
}
