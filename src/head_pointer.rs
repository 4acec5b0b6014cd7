use crate::{config::PointerConfig, types::JointOrientation};

/// Cursor movement derived from where the head is facing.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PointerDelta {
    pub dx: i32,
    pub dy: i32,
    /// Facing direction normalised to `[0, 1]` on both axes, for display.
    pub direction: (f32, f32),
}

pub fn pointer_delta(head: &JointOrientation, cfg: &PointerConfig) -> PointerDelta {
    let raw_x = head.m21();
    let raw_y = if cfg.invert_y { -head.m23() } else { head.m23() };

    let dir_x = dead_zone(raw_x, cfg.play);
    let dir_y = dead_zone(raw_y, cfg.play);

    PointerDelta {
        dx: (dir_x * cfg.amplification) as i32,
        dy: (dir_y * cfg.amplification) as i32,
        direction: ((1.0 + raw_x) / 2.0, (1.0 + raw_y) / 2.0),
    }
}

fn dead_zone(value: f32, play: f32) -> f32 {
    if value > play {
        value - play
    } else if value < -play {
        value + play
    } else {
        0.0
    }
}
