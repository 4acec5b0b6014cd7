use crate::error::{FusionError, Result};

/// Background tint written by the occlusion mask, in BGRA order.
#[derive(Clone, Debug)]
pub struct MaskConfig {
    pub tint_bgra: [u8; 4],
}

impl Default for MaskConfig {
    fn default() -> Self {
        Self {
            tint_bgra: [255, 0, 0, 128],
        }
    }
}

#[derive(Clone, Debug)]
pub struct OverlayConfig {
    /// `k` in `size = k / z` when scaling by depth.
    pub depth_scale: f32,
    pub scale_by_depth: bool,
    /// Side length used when depth scaling is off.
    pub fixed_size: f32,
    /// Applied to the size while the subject holds a pose.
    pub posture_multiplier: f32,
    /// Square resolution sprites are resampled to at stream start.
    pub sprite_resolution: u32,
    /// Callout rectangle relative to the projected head: (dx, dy, width, height).
    pub callout_rect: (i32, i32, u32, u32),
    /// Maximum angle in degrees between the sound source and the head.
    pub callout_tolerance_deg: f32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            depth_scale: 192.0,
            scale_by_depth: true,
            fixed_size: 128.0,
            posture_multiplier: 2.0,
            sprite_resolution: 128,
            callout_rect: (32, -64, 96, 64),
            callout_tolerance_deg: 10.0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct PostureThresholds {
    /// Minimum off-axis magnitude of the right wrist bone for the raised pose.
    pub wrist_rotation_min: f32,
    /// Minimum dot product between elbow and wrist bone axes for a straight arm.
    pub collinearity_min: f32,
    /// Minimum wrist distance from the shoulder, in meters, for the side poses.
    pub reach_min: f32,
    /// Allowed off-axis drift, in meters, for the side poses.
    pub band: f32,
}

impl Default for PostureThresholds {
    fn default() -> Self {
        Self {
            wrist_rotation_min: 0.3,
            collinearity_min: 0.9,
            reach_min: 0.25,
            band: 0.15,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SubjectKeying {
    /// History belongs to the slot regardless of who occupies it.
    Slot,
    /// History is dropped when the slot's tracking id changes.
    #[default]
    TrackingId,
}

#[derive(Clone, Debug)]
pub struct GestureConfig {
    /// Slack, in meters, allowed against the expected direction of motion.
    pub motion_play: f32,
    pub keying: SubjectKeying,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            motion_play: 0.05,
            keying: SubjectKeying::default(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct PointerConfig {
    pub play: f32,
    pub amplification: f32,
    pub invert_y: bool,
}

impl Default for PointerConfig {
    fn default() -> Self {
        Self {
            play: 0.1,
            amplification: 50.0,
            invert_y: false,
        }
    }
}

#[derive(Clone, Debug)]
pub struct PipelineFeatures {
    pub occlusion_mask: bool,
    pub posture_overlay: bool,
    pub gesture_signal: bool,
    pub head_pointer: bool,
    pub callout: bool,
}

impl Default for PipelineFeatures {
    fn default() -> Self {
        Self {
            occlusion_mask: true,
            posture_overlay: true,
            gesture_signal: true,
            head_pointer: false,
            callout: false,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct FusionConfig {
    pub mask: MaskConfig,
    pub overlay: OverlayConfig,
    pub posture: PostureThresholds,
    pub gesture: GestureConfig,
    pub pointer: PointerConfig,
    pub features: PipelineFeatures,
}

impl FusionConfig {
    pub fn validate(&self) -> Result<()> {
        let overlay = &self.overlay;
        if !(overlay.depth_scale > 0.0) {
            return Err(invalid(format!(
                "overlay depth scale must be positive, got {}",
                overlay.depth_scale
            )));
        }
        if !(overlay.fixed_size > 0.0) {
            return Err(invalid(format!(
                "overlay fixed size must be positive, got {}",
                overlay.fixed_size
            )));
        }
        if !(overlay.posture_multiplier > 0.0) {
            return Err(invalid(format!(
                "posture multiplier must be positive, got {}",
                overlay.posture_multiplier
            )));
        }
        if overlay.sprite_resolution == 0 {
            return Err(invalid("sprite resolution must be non-zero".to_string()));
        }
        if !(-1.0..=1.0).contains(&self.posture.collinearity_min) {
            return Err(invalid(format!(
                "collinearity threshold {} is outside [-1, 1]",
                self.posture.collinearity_min
            )));
        }
        if self.posture.reach_min < 0.0 || self.posture.band < 0.0 {
            return Err(invalid("posture distances must be non-negative".to_string()));
        }
        if self.gesture.motion_play < 0.0 {
            return Err(invalid(format!(
                "motion play must be non-negative, got {}",
                self.gesture.motion_play
            )));
        }
        if !(0.0..1.0).contains(&self.pointer.play) {
            return Err(invalid(format!(
                "pointer play {} is outside [0, 1)",
                self.pointer.play
            )));
        }
        Ok(())
    }
}

fn invalid(message: String) -> FusionError {
    FusionError::InvalidConfig(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        FusionConfig::default().validate().expect("default config");
    }

    #[test]
    fn rejects_non_positive_depth_scale() {
        let mut cfg = FusionConfig::default();
        cfg.overlay.depth_scale = 0.0;
        assert!(matches!(cfg.validate(), Err(FusionError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_collinearity_outside_unit_range() {
        let mut cfg = FusionConfig::default();
        cfg.posture.collinearity_min = 1.5;
        assert!(cfg.validate().is_err());
    }
}
