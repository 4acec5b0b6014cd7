use crate::{
    config::MaskConfig,
    error::{FusionError, Result},
    mapper::CoordinateMapper,
    types::{ColorImageFormat, ColorPoint, DepthFrame, DepthImageFormat},
};

/// Builds the BGRA overlay that tints color pixels without a tracked body.
///
/// Several depth cells can project onto the same color pixel. The last cell in
/// row-major order wins and nothing is accumulated, so thin gaps between a
/// subject's silhouette and the tint are expected.
pub struct OcclusionMaskBuilder {
    color_format: ColorImageFormat,
    depth_format: DepthImageFormat,
    tint: [u8; 4],
    depth_color_points: Vec<ColorPoint>,
    mask: Vec<u8>,
}

impl OcclusionMaskBuilder {
    pub fn new(
        color_format: ColorImageFormat,
        depth_format: DepthImageFormat,
        cfg: &MaskConfig,
    ) -> Self {
        Self {
            color_format,
            depth_format,
            tint: cfg.tint_bgra,
            depth_color_points: vec![ColorPoint::default(); depth_format.pixel_count()],
            mask: vec![0u8; color_format.pixel_count() * 4],
        }
    }

    pub fn build<M: CoordinateMapper + ?Sized>(
        &mut self,
        depth: &DepthFrame,
        mapper: &M,
    ) -> Result<&[u8]> {
        if depth.format != self.depth_format || depth.samples.len() != self.depth_color_points.len()
        {
            return Err(FusionError::DepthSizeMismatch {
                got: depth.samples.len(),
                expected: self.depth_color_points.len(),
            });
        }

        mapper.map_depth_frame(depth, self.color_format, &mut self.depth_color_points);

        self.mask.fill(0);
        let (width, height) = (self.color_format.width(), self.color_format.height());
        let mut clipped = 0usize;
        for (sample, point) in depth.samples.iter().zip(self.depth_color_points.iter()) {
            if sample.has_player() {
                continue;
            }
            match point.pixel_index(width, height) {
                Some(pixel) => {
                    let idx = pixel * 4;
                    self.mask[idx..idx + 4].copy_from_slice(&self.tint);
                }
                None => clipped += 1,
            }
        }
        if clipped > 0 {
            log::trace!("occlusion mask skipped {clipped} out-of-frame projections");
        }

        Ok(&self.mask)
    }

    /// Mask with every pixel transparent, used when masking is disabled.
    pub fn clear(&mut self) -> &[u8] {
        self.mask.fill(0);
        &self.mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        mapper::NominalMapper,
        types::{DepthPoint, DepthSample, SkeletonPoint},
    };

    fn builder() -> OcclusionMaskBuilder {
        OcclusionMaskBuilder::new(
            ColorImageFormat::Rgb640x480Fps30,
            DepthImageFormat::Resolution80x60Fps30,
            &MaskConfig::default(),
        )
    }

    #[test]
    fn tracked_cells_stay_transparent() {
        let mut builder = builder();
        let mut depth = DepthFrame::filled(
            DepthImageFormat::Resolution80x60Fps30,
            DepthSample::new(2000, 0),
        );
        for x in 10..20 {
            depth.samples[30 * 80 + x] = DepthSample::new(1500, 1);
        }

        let mapper = NominalMapper::default();
        let mut points = vec![ColorPoint::default(); depth.samples.len()];
        mapper.map_depth_frame(&depth, ColorImageFormat::Rgb640x480Fps30, &mut points);
        let mask = builder.build(&depth, &mapper).expect("mask").to_vec();

        for (sample, point) in depth.samples.iter().zip(points.iter()) {
            let idx = point.pixel_index(640, 480).expect("in frame") * 4;
            if sample.has_player() {
                assert_eq!(mask[idx + 3], 0);
            } else {
                assert_eq!(&mask[idx..idx + 4], &[255, 0, 0, 128]);
            }
        }
    }

    #[test]
    fn tint_is_configurable() {
        let cfg = MaskConfig {
            tint_bgra: [0, 0, 255, 200],
        };
        let mut builder = OcclusionMaskBuilder::new(
            ColorImageFormat::Rgb640x480Fps30,
            DepthImageFormat::Resolution80x60Fps30,
            &cfg,
        );
        let depth = DepthFrame::filled(
            DepthImageFormat::Resolution80x60Fps30,
            DepthSample::new(2000, 0),
        );
        let mask = builder.build(&depth, &NominalMapper::default()).expect("mask");
        assert_eq!(&mask[0..4], &[0, 0, 255, 200]);
    }

    #[test]
    fn mask_is_cleared_between_builds() {
        let mut builder = builder();
        let background = DepthFrame::filled(
            DepthImageFormat::Resolution80x60Fps30,
            DepthSample::new(2000, 0),
        );
        let mapper = NominalMapper::default();
        builder.build(&background, &mapper).expect("mask");

        let body = DepthFrame::filled(
            DepthImageFormat::Resolution80x60Fps30,
            DepthSample::new(2000, 3),
        );
        let mask = builder.build(&body, &mapper).expect("mask");
        assert!(mask.iter().all(|&b| b == 0));
    }

    struct OffsetMapper;

    impl CoordinateMapper for OffsetMapper {
        fn map_depth_to_color(
            &self,
            point: DepthPoint,
            _depth_format: DepthImageFormat,
            _color_format: ColorImageFormat,
        ) -> ColorPoint {
            ColorPoint {
                x: point.x as i32 - 5,
                y: point.y as i32,
            }
        }

        fn map_skeleton_point_to_color(
            &self,
            _point: SkeletonPoint,
            _color_format: ColorImageFormat,
        ) -> ColorPoint {
            ColorPoint::SENTINEL
        }
    }

    #[test]
    fn out_of_frame_projections_are_skipped() {
        let mut builder = builder();
        let depth = DepthFrame::filled(
            DepthImageFormat::Resolution80x60Fps30,
            DepthSample::new(2000, 0),
        );
        let mask = builder.build(&depth, &OffsetMapper).expect("mask");
        // Cell (5, 0) lands on pixel (0, 0); cells 0..5 fall off the left edge.
        assert_eq!(mask[3], 128);
        assert_eq!(mask[75 * 4 + 3], 0);
    }

    #[test]
    fn rejects_mismatched_depth_format() {
        let mut builder = builder();
        let depth = DepthFrame::filled(
            DepthImageFormat::Resolution320x240Fps30,
            DepthSample::default(),
        );
        assert!(matches!(
            builder.build(&depth, &NominalMapper::default()),
            Err(FusionError::DepthSizeMismatch { .. })
        ));
    }
}
