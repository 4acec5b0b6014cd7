use rayon::prelude::*;

use crate::types::{
    ColorImageFormat, ColorPoint, DepthFrame, DepthImageFormat, DepthPoint, SkeletonPoint,
};

/// Nominal focal length of the color camera at 640x480, in pixels.
pub const NOMINAL_COLOR_FOCAL_LENGTH: f32 = 531.15;

/// Projection between the sensor's coordinate spaces. Real sensors supply
/// their factory calibration through this trait.
pub trait CoordinateMapper: Send + Sync {
    fn map_depth_to_color(
        &self,
        point: DepthPoint,
        depth_format: DepthImageFormat,
        color_format: ColorImageFormat,
    ) -> ColorPoint;

    fn map_skeleton_point_to_color(
        &self,
        point: SkeletonPoint,
        color_format: ColorImageFormat,
    ) -> ColorPoint;

    /// Maps every cell of `depth` into `out`, which must hold one entry per cell.
    fn map_depth_frame(
        &self,
        depth: &DepthFrame,
        color_format: ColorImageFormat,
        out: &mut [ColorPoint],
    ) {
        let width = depth.format.width() as usize;
        let depth_format = depth.format;
        out.par_iter_mut()
            .zip(depth.samples.par_iter())
            .enumerate()
            .for_each(|(idx, (dst, sample))| {
                let point = DepthPoint {
                    x: (idx % width) as u32,
                    y: (idx / width) as u32,
                    sample: *sample,
                };
                *dst = self.map_depth_to_color(point, depth_format, color_format);
            });
    }
}

/// Mapper built from nominal intrinsics. It ignores the parallax between the
/// depth and color cameras apart from a constant registration offset, which is
/// close enough for replay and tests but not a substitute for calibration.
#[derive(Clone, Debug, Default)]
pub struct NominalMapper {
    /// Shift applied after scaling depth cells onto the color grid, in color pixels.
    pub registration_offset: (i32, i32),
}

impl NominalMapper {
    pub fn new(registration_offset: (i32, i32)) -> Self {
        Self {
            registration_offset,
        }
    }
}

impl CoordinateMapper for NominalMapper {
    fn map_depth_to_color(
        &self,
        point: DepthPoint,
        depth_format: DepthImageFormat,
        color_format: ColorImageFormat,
    ) -> ColorPoint {
        if point.x >= depth_format.width() || point.y >= depth_format.height() {
            return ColorPoint::SENTINEL;
        }
        let sx = color_format.width() as f32 / depth_format.width() as f32;
        let sy = color_format.height() as f32 / depth_format.height() as f32;
        ColorPoint {
            x: (point.x as f32 * sx) as i32 + self.registration_offset.0,
            y: (point.y as f32 * sy) as i32 + self.registration_offset.1,
        }
    }

    fn map_skeleton_point_to_color(
        &self,
        point: SkeletonPoint,
        color_format: ColorImageFormat,
    ) -> ColorPoint {
        if !(point.z > 0.0) || !point.x.is_finite() || !point.y.is_finite() {
            return ColorPoint::SENTINEL;
        }
        let width = color_format.width() as f32;
        let height = color_format.height() as f32;
        let focal = NOMINAL_COLOR_FOCAL_LENGTH * width / 640.0;
        let px = width / 2.0 + focal * point.x / point.z;
        let py = height / 2.0 - focal * point.y / point.z;
        ColorPoint {
            x: px.round() as i32,
            y: py.round() as i32,
        }
    }
}
