use std::sync::Arc;

use fast_image_resize as fir;

use crate::{
    config::OverlayConfig,
    error::{FusionError, Result},
    types::{ColorPoint, JointOrientation, PostureCode, SkeletonPoint},
};

/// 2D affine transform in row-vector form:
/// `x' = x*m11 + y*m21 + offset_x`, `y' = x*m12 + y*m22 + offset_y`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Affine2 {
    pub m11: f32,
    pub m12: f32,
    pub m21: f32,
    pub m22: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

impl Affine2 {
    pub fn translation(x: f32, y: f32) -> Self {
        Self {
            m11: 1.0,
            m12: 0.0,
            m21: 0.0,
            m22: 1.0,
            offset_x: x,
            offset_y: y,
        }
    }

    /// In-plane rotation taken from a joint orientation, anchored at `anchor`.
    /// The X terms are negated because the color image is mirrored.
    pub fn from_orientation(orientation: &JointOrientation, anchor: ColorPoint) -> Self {
        Self {
            m11: -orientation.m11(),
            m12: orientation.m12(),
            m21: -orientation.m21(),
            m22: orientation.m22(),
            offset_x: anchor.x as f32,
            offset_y: anchor.y as f32,
        }
    }

    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            x * self.m11 + y * self.m21 + self.offset_x,
            x * self.m12 + y * self.m22 + self.offset_y,
        )
    }

    pub fn determinant(&self) -> f32 {
        self.m11 * self.m22 - self.m12 * self.m21
    }

    pub fn inverse(&self) -> Option<Affine2> {
        let det = self.determinant();
        if !det.is_finite() || det.abs() < 1e-6 {
            return None;
        }
        let m11 = self.m22 / det;
        let m12 = -self.m12 / det;
        let m21 = -self.m21 / det;
        let m22 = self.m11 / det;
        Some(Affine2 {
            m11,
            m12,
            m21,
            m22,
            offset_x: -(self.offset_x * m11 + self.offset_y * m21),
            offset_y: -(self.offset_x * m12 + self.offset_y * m22),
        })
    }
}

/// Square BGRA image resampled once at stream start.
#[derive(Clone, Debug)]
pub struct Sprite {
    pub bgra: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Sprite {
    pub fn from_rgba(width: u32, height: u32, rgba: Vec<u8>, resolution: u32) -> Result<Self> {
        check_resolution(resolution)?;
        let expected_len = (width as usize)
            .saturating_mul(height as usize)
            .saturating_mul(4);
        if width == 0 || height == 0 || rgba.len() != expected_len {
            return Err(FusionError::Sprite(format!(
                "sprite buffer size mismatch: got {}, expected {}",
                rgba.len(),
                expected_len
            )));
        }

        let mut bgra = if width == resolution && height == resolution {
            rgba
        } else {
            let src = fir::images::Image::from_vec_u8(width, height, rgba, fir::PixelType::U8x4)
                .map_err(|err| FusionError::Sprite(format!("invalid sprite buffer: {err}")))?;
            let mut dst = fir::images::Image::new(resolution, resolution, fir::PixelType::U8x4);
            let options = fir::ResizeOptions::new()
                .resize_alg(fir::ResizeAlg::Convolution(fir::FilterType::Bilinear));
            fir::Resizer::new()
                .resize(&src, &mut dst, Some(&options))
                .map_err(|err| FusionError::Sprite(format!("sprite resize failed: {err}")))?;
            dst.into_vec()
        };

        for px in bgra.chunks_exact_mut(4) {
            px.swap(0, 2);
        }

        Ok(Self {
            bgra,
            width: resolution,
            height: resolution,
        })
    }

    pub fn from_image(image: &image::RgbaImage, resolution: u32) -> Result<Self> {
        Self::from_rgba(
            image.width(),
            image.height(),
            image.as_raw().clone(),
            resolution,
        )
    }

    /// Filled disc on a transparent background. Handy when no asset is supplied.
    pub fn disc(resolution: u32, rgba: [u8; 4]) -> Result<Self> {
        check_resolution(resolution)?;
        let mut bgra = vec![0u8; resolution as usize * resolution as usize * 4];
        let r = resolution as f32 / 2.0;
        for (i, px) in bgra.chunks_exact_mut(4).enumerate() {
            let x = (i as u32 % resolution) as f32 + 0.5 - r;
            let y = (i as u32 / resolution) as f32 + 0.5 - r;
            if x * x + y * y <= r * r {
                px.copy_from_slice(&[rgba[2], rgba[1], rgba[0], rgba[3]]);
            }
        }
        Ok(Self {
            bgra,
            width: resolution,
            height: resolution,
        })
    }

    /// Fails unless the sprite has at least one pixel and its buffer matches
    /// its dimensions. Sampling relies on both.
    pub fn validate(&self) -> Result<()> {
        let expected = (self.width as usize)
            .saturating_mul(self.height as usize)
            .saturating_mul(4);
        if self.width == 0 || self.height == 0 || self.bgra.len() != expected {
            return Err(FusionError::Sprite(format!(
                "sprite is {}x{} with {} bytes, expected a non-empty {} byte buffer",
                self.width,
                self.height,
                self.bgra.len(),
                expected
            )));
        }
        Ok(())
    }

    /// Bilinear sample in sprite pixel coordinates, premultiplied by alpha.
    pub(crate) fn sample(&self, x: f32, y: f32) -> [f32; 4] {
        let x = x.clamp(0.0, (self.width - 1) as f32);
        let y = y.clamp(0.0, (self.height - 1) as f32);
        let x0 = x.floor() as u32;
        let y0 = y.floor() as u32;
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);
        let fx = x - x0 as f32;
        let fy = y - y0 as f32;

        let fetch = |cx: u32, cy: u32| -> [f32; 4] {
            let idx = ((cy * self.width + cx) as usize) * 4;
            let a = self.bgra[idx + 3] as f32 / 255.0;
            [
                self.bgra[idx] as f32 * a,
                self.bgra[idx + 1] as f32 * a,
                self.bgra[idx + 2] as f32 * a,
                a,
            ]
        };

        let c00 = fetch(x0, y0);
        let c10 = fetch(x1, y0);
        let c01 = fetch(x0, y1);
        let c11 = fetch(x1, y1);
        let lerp = |a: f32, b: f32, t: f32| a + (b - a) * t;
        let mut out = [0.0f32; 4];
        for c in 0..4 {
            out[c] = lerp(lerp(c00[c], c10[c], fx), lerp(c01[c], c11[c], fx), fy);
        }
        out
    }
}

fn check_resolution(resolution: u32) -> Result<()> {
    if resolution == 0 {
        return Err(FusionError::Sprite("sprite resolution must be positive".to_string()));
    }
    Ok(())
}

/// A sprite placed in output space: `rect` is in local coordinates and
/// `transform` maps local to frame pixels.
#[derive(Clone, Debug)]
pub struct Overlay {
    pub sprite: Arc<Sprite>,
    pub transform: Affine2,
    pub rect: [f32; 4],
}

/// Side length of a head overlay for a subject at depth `z`. Only the raised
/// pose enlarges the overlay.
pub fn overlay_size(
    z: f32,
    posture: PostureCode,
    cfg: &OverlayConfig,
    posture_scaling: bool,
) -> f32 {
    let base = if cfg.scale_by_depth {
        if !(z > 0.0) {
            return 0.0;
        }
        (cfg.depth_scale / z).trunc()
    } else {
        cfg.fixed_size
    };
    if posture_scaling && posture == PostureCode::Pose1 {
        base * cfg.posture_multiplier
    } else {
        base
    }
}

pub fn head_overlay(
    sprite: &Arc<Sprite>,
    anchor: ColorPoint,
    orientation: &JointOrientation,
    size: f32,
) -> Option<Overlay> {
    if !(size > 0.0) || anchor == ColorPoint::SENTINEL {
        return None;
    }
    let half = size / 2.0;
    Some(Overlay {
        sprite: Arc::clone(sprite),
        transform: Affine2::from_orientation(orientation, anchor),
        rect: [-half, -half, size, size],
    })
}

/// Whether the sound source points at `head` within the configured tolerance.
pub fn callout_visible(
    head: SkeletonPoint,
    sound_source_angle: Option<f32>,
    cfg: &OverlayConfig,
) -> bool {
    let Some(sound) = sound_source_angle else {
        return false;
    };
    let angle = head.x.atan2(head.z).to_degrees();
    (sound - angle).abs() < cfg.callout_tolerance_deg
}

pub fn callout_overlay(
    sprite: &Arc<Sprite>,
    anchor: ColorPoint,
    cfg: &OverlayConfig,
) -> Option<Overlay> {
    if anchor == ColorPoint::SENTINEL {
        return None;
    }
    let (dx, dy, w, h) = cfg.callout_rect;
    Some(Overlay {
        sprite: Arc::clone(sprite),
        transform: Affine2::translation((anchor.x + dx) as f32, (anchor.y + dy) as f32),
        rect: [0.0, 0.0, w as f32, h as f32],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverse_round_trips_points() {
        let t = Affine2 {
            m11: 0.6,
            m12: 0.8,
            m21: -0.8,
            m22: 0.6,
            offset_x: 100.0,
            offset_y: 50.0,
        };
        let inv = t.inverse().expect("invertible");
        let (x, y) = t.apply(12.0, -7.0);
        let (bx, by) = inv.apply(x, y);
        assert!((bx - 12.0).abs() < 1e-4);
        assert!((by + 7.0).abs() < 1e-4);
    }

    #[test]
    fn singular_transform_has_no_inverse() {
        let t = Affine2 {
            m11: 1.0,
            m12: 2.0,
            m21: 2.0,
            m22: 4.0,
            offset_x: 0.0,
            offset_y: 0.0,
        };
        assert!(t.inverse().is_none());
    }

    #[test]
    fn orientation_sub_block_is_mirrored() {
        let t = Affine2::from_orientation(&JointOrientation::IDENTITY, ColorPoint { x: 10, y: 20 });
        assert_eq!(t.m11, -1.0);
        assert_eq!(t.m22, 1.0);
        assert_eq!(t.apply(1.0, 1.0), (9.0, 21.0));
    }

    #[test]
    fn size_shrinks_with_depth_and_doubles_in_pose() {
        let cfg = OverlayConfig::default();
        assert_eq!(overlay_size(2.0, PostureCode::None, &cfg, true), 96.0);
        assert_eq!(overlay_size(2.5, PostureCode::None, &cfg, true), 76.0);
        assert_eq!(overlay_size(2.0, PostureCode::Pose1, &cfg, true), 192.0);
        assert_eq!(overlay_size(2.0, PostureCode::Pose1, &cfg, false), 96.0);
        assert_eq!(overlay_size(0.0, PostureCode::None, &cfg, true), 0.0);
    }

    #[test]
    fn only_the_raised_pose_enlarges_the_overlay() {
        let cfg = OverlayConfig::default();
        for posture in [PostureCode::Pose2, PostureCode::Pose3, PostureCode::Pose4] {
            assert_eq!(overlay_size(2.0, posture, &cfg, true), 96.0, "{posture:?}");
        }
    }

    #[test]
    fn resting_subject_keeps_base_size() {
        use crate::{
            posture::{PostureClassifier, tests::skeleton_with_wrist},
            types::JointType,
        };

        // Right arm hanging straight down beside the body.
        let resting = skeleton_with_wrist(SkeletonPoint::new(0.22, -0.15, 2.0), false);
        let posture = PostureClassifier::default().classify(&resting);
        assert_eq!(posture, PostureCode::Pose3);

        let z = resting.joint(JointType::Head).position.z;
        assert_eq!(overlay_size(z, posture, &OverlayConfig::default(), true), 96.0);
    }

    #[test]
    fn fixed_size_ignores_depth() {
        let cfg = OverlayConfig {
            scale_by_depth: false,
            ..OverlayConfig::default()
        };
        assert_eq!(overlay_size(3.0, PostureCode::None, &cfg, true), 128.0);
    }

    #[test]
    fn callout_requires_matching_sound_direction() {
        let cfg = OverlayConfig::default();
        let head = SkeletonPoint::new(0.0, 0.3, 2.0);
        assert!(callout_visible(head, Some(4.0), &cfg));
        assert!(!callout_visible(head, Some(15.0), &cfg));
        assert!(!callout_visible(head, None, &cfg));
    }

    #[test]
    fn sprite_is_resampled_and_swizzled() {
        let rgba = [10u8, 20, 30, 255].repeat(4 * 4);
        let sprite = Sprite::from_rgba(4, 4, rgba, 8).expect("sprite");
        assert_eq!((sprite.width, sprite.height), (8, 8));
        assert_eq!(sprite.bgra.len(), 8 * 8 * 4);
        assert_eq!(&sprite.bgra[0..4], &[30, 20, 10, 255]);
    }

    #[test]
    fn sprite_rejects_short_buffer() {
        assert!(Sprite::from_rgba(4, 4, vec![0u8; 10], 8).is_err());
    }

    #[test]
    fn zero_resolution_sprites_are_rejected() {
        assert!(matches!(
            Sprite::disc(0, [255, 255, 255, 255]),
            Err(FusionError::Sprite(_))
        ));
        let rgba = [10u8, 20, 30, 255].repeat(4 * 4);
        assert!(matches!(
            Sprite::from_rgba(4, 4, rgba, 0),
            Err(FusionError::Sprite(_))
        ));
    }

    #[test]
    fn validate_catches_hand_built_sprites() {
        let empty = Sprite {
            bgra: Vec::new(),
            width: 0,
            height: 0,
        };
        assert!(empty.validate().is_err());

        let short = Sprite {
            bgra: vec![0u8; 8],
            width: 2,
            height: 2,
        };
        assert!(short.validate().is_err());

        let disc = Sprite::disc(4, [255, 0, 0, 255]).expect("sprite");
        assert!(disc.validate().is_ok());
    }
}
