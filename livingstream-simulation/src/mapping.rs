//! Sensor space to scene space.
//!
//! Every mapper is a pure function of its parameters and the input point.
//! A mapper returns `None` for a point kind it does not understand (a planar
//! mapper handed a metric reading, for example).

use glam::{Quat, Vec2, Vec3};
use livingstream_transport::SensorPoint;

/// Which scene plane counts as the ground. The remaining axis is "up".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroundPlane {
    /// Ground spans X/Y, Z is up
    Xy,
    /// Ground spans X/Z, Y is up
    #[default]
    Xz,
}

impl GroundPlane {
    /// Build a scene point from in-plane coordinates and a height
    pub fn place(self, a: f32, b: f32, height: f32) -> Vec3 {
        match self {
            GroundPlane::Xy => Vec3::new(a, b, height),
            GroundPlane::Xz => Vec3::new(a, height, b),
        }
    }

    /// Drop the vertical component
    pub fn project(self, point: Vec3) -> Vec2 {
        match self {
            GroundPlane::Xy => Vec2::new(point.x, point.y),
            GroundPlane::Xz => Vec2::new(point.x, point.z),
        }
    }

    /// In-plane direction as a scene vector with no vertical component
    pub fn lift(self, planar: Vec2) -> Vec3 {
        self.place(planar.x, planar.y, 0.0)
    }
}

pub trait CoordinateMapper {
    fn map(&self, point: &SensorPoint) -> Option<Vec3>;
}

/// Camera pixels stretched over a rectangle of the scene, Y flipped so the
/// top-left sensor origin lands at the rectangle's far edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanarMapper {
    pub sensor_size: Vec2,
    pub scene_size: Vec2,
    pub origin: Vec2,
    pub ground_height: f32,
    pub plane: GroundPlane,
}

impl PlanarMapper {
    /// In-plane scene coordinates for a pixel
    pub fn map_pixel(&self, x: f32, y: f32) -> Vec2 {
        let nx = x / self.sensor_size.x;
        let ny = 1.0 - y / self.sensor_size.y;
        self.origin + Vec2::new(nx, ny) * self.scene_size
    }
}

impl Default for PlanarMapper {
    fn default() -> Self {
        PlanarMapper {
            sensor_size: Vec2::new(640.0, 480.0),
            scene_size: Vec2::new(10.0, 7.5),
            origin: Vec2::ZERO,
            ground_height: 0.0,
            plane: GroundPlane::Xz,
        }
    }
}

impl CoordinateMapper for PlanarMapper {
    fn map(&self, point: &SensorPoint) -> Option<Vec3> {
        match *point {
            SensorPoint::Pixel { x, y, .. } => {
                let planar = self.map_pixel(x, y);
                Some(self.plane.place(planar.x, planar.y, self.ground_height))
            }
            SensorPoint::Metric(_) => None,
        }
    }
}

/// Depth-camera meters rotated by a fixed tilt about X, then either flattened
/// onto the ground or kept in 3D.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialMapper {
    pub rotation: Quat,
    pub preserve_vertical: bool,
    pub scale: f32,
    pub offset: Vec3,
    pub ground_height: f32,
}

impl SpatialMapper {
    pub fn with_tilt_degrees(tilt_degrees: f32) -> Self {
        SpatialMapper {
            rotation: Quat::from_rotation_x(tilt_degrees.to_radians()),
            ..Self::default()
        }
    }
}

impl Default for SpatialMapper {
    fn default() -> Self {
        SpatialMapper {
            rotation: Quat::from_rotation_x((-30.0_f32).to_radians()),
            preserve_vertical: false,
            scale: 1.0,
            offset: Vec3::ZERO,
            ground_height: 0.0,
        }
    }
}

impl CoordinateMapper for SpatialMapper {
    fn map(&self, point: &SensorPoint) -> Option<Vec3> {
        match *point {
            SensorPoint::Metric(position) => {
                let world = self.rotation * position * self.scale + self.offset;
                if self.preserve_vertical {
                    Some(world)
                } else {
                    Some(Vec3::new(world.x, self.ground_height, world.z))
                }
            }
            SensorPoint::Pixel { .. } => None,
        }
    }
}

/// Pixels divided by a constant, no flip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelScaleMapper {
    pub scale_factor: f32,
    pub ground_height: f32,
    pub plane: GroundPlane,
}

impl Default for PixelScaleMapper {
    fn default() -> Self {
        PixelScaleMapper {
            scale_factor: 100.0,
            ground_height: 0.0,
            plane: GroundPlane::Xz,
        }
    }
}

impl CoordinateMapper for PixelScaleMapper {
    fn map(&self, point: &SensorPoint) -> Option<Vec3> {
        match *point {
            SensorPoint::Pixel { x, y, .. } => Some(self.plane.place(
                x / self.scale_factor,
                y / self.scale_factor,
                self.ground_height,
            )),
            SensorPoint::Metric(_) => None,
        }
    }
}

/// The mapper chosen for a deployment
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MappingStrategy {
    Planar(PlanarMapper),
    Spatial(SpatialMapper),
    PixelScale(PixelScaleMapper),
}

impl CoordinateMapper for MappingStrategy {
    fn map(&self, point: &SensorPoint) -> Option<Vec3> {
        match self {
            MappingStrategy::Planar(mapper) => mapper.map(point),
            MappingStrategy::Spatial(mapper) => mapper.map(point),
            MappingStrategy::PixelScale(mapper) => mapper.map(point),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pixel(x: f32, y: f32) -> SensorPoint {
        SensorPoint::Pixel { x, y, depth: Some(1.0) }
    }

    fn assert_close(actual: Vec3, expected: Vec3) {
        assert!(
            actual.abs_diff_eq(expected, 1e-5),
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn planar_centre_pixel_maps_to_scene_centre() {
        let mapper = PlanarMapper {
            plane: GroundPlane::Xy,
            ..PlanarMapper::default()
        };
        assert_eq!(mapper.map_pixel(320.0, 240.0), Vec2::new(5.0, 3.75));
        assert_close(mapper.map(&pixel(320.0, 240.0)).unwrap(), Vec3::new(5.0, 3.75, 0.0));

        let ground = PlanarMapper::default();
        assert_close(ground.map(&pixel(320.0, 240.0)).unwrap(), Vec3::new(5.0, 0.0, 3.75));
    }

    #[test]
    fn planar_is_monotonic_with_y_flip() {
        let mapper = PlanarMapper {
            origin: Vec2::new(-5.0, -3.75),
            ..PlanarMapper::default()
        };
        let mut previous = mapper.map_pixel(0.0, 0.0);
        for step in 1..=64 {
            let x = step as f32 * 10.0;
            let next = mapper.map_pixel(x, 0.0);
            assert!(next.x > previous.x);
            previous = next;
        }
        let mut previous = mapper.map_pixel(0.0, 0.0);
        for step in 1..=48 {
            let y = step as f32 * 10.0;
            let next = mapper.map_pixel(0.0, y);
            assert!(next.y < previous.y);
            previous = next;
        }
        assert_eq!(mapper.map_pixel(0.0, 0.0), Vec2::new(-5.0, 3.75));
        assert_eq!(mapper.map_pixel(640.0, 480.0), Vec2::new(5.0, -3.75));
    }

    #[test]
    fn spatial_tilts_and_flattens() {
        let mapper = SpatialMapper::default();
        let mapped = mapper.map(&SensorPoint::Metric(Vec3::new(0.0, 0.0, 1.0))).unwrap();
        let cos = 30.0_f32.to_radians().cos();
        assert_close(mapped, Vec3::new(0.0, 0.0, cos));

        let upright = SpatialMapper {
            preserve_vertical: true,
            ..mapper
        };
        let mapped = upright.map(&SensorPoint::Metric(Vec3::new(0.0, 0.0, 1.0))).unwrap();
        assert_close(mapped, Vec3::new(0.0, 0.5, cos));
    }

    #[test]
    fn spatial_scale_and_offset_apply_after_rotation() {
        let mapper = SpatialMapper {
            rotation: Quat::IDENTITY,
            scale: 2.0,
            offset: Vec3::new(1.0, 5.0, -1.0),
            ground_height: 0.25,
            preserve_vertical: false,
        };
        let mapped = mapper.map(&SensorPoint::Metric(Vec3::new(1.0, 1.0, 1.0))).unwrap();
        assert_close(mapped, Vec3::new(3.0, 0.25, 1.0));
    }

    #[test]
    fn pixel_scale_divides_without_flip() {
        let mapper = PixelScaleMapper::default();
        assert_close(mapper.map(&pixel(250.0, 100.0)).unwrap(), Vec3::new(2.5, 0.0, 1.0));
    }

    #[test]
    fn mappers_reject_foreign_point_kinds() {
        let metric = SensorPoint::Metric(Vec3::ONE);
        assert!(MappingStrategy::Planar(PlanarMapper::default()).map(&metric).is_none());
        assert!(MappingStrategy::PixelScale(PixelScaleMapper::default()).map(&metric).is_none());
        assert!(MappingStrategy::Spatial(SpatialMapper::default()).map(&pixel(1.0, 1.0)).is_none());
    }
}
