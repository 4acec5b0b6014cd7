use rayon::prelude::*;

use crate::{
    overlay::Overlay,
    types::{ColorImageFormat, Frame},
};

/// Owns the output frame and redraws it in place every tick.
pub struct FrameCompositor {
    output: Frame,
}

impl FrameCompositor {
    pub fn new(color_format: ColorImageFormat) -> Self {
        Self {
            output: Frame::blank(color_format.width(), color_format.height()),
        }
    }

    pub fn output(&self) -> &Frame {
        &self.output
    }

    /// Draws the color frame, then the mask, then each overlay in order. The
    /// caller guarantees `color` and `mask` match the output dimensions.
    pub fn compose(&mut self, color: &Frame, mask: &[u8], overlays: &[Overlay]) -> &Frame {
        debug_assert_eq!(color.bgra.len(), self.output.bgra.len());
        debug_assert_eq!(mask.len(), self.output.bgra.len());

        self.output.timestamp = color.timestamp;
        self.output.bgra.copy_from_slice(&color.bgra);

        self.output
            .bgra
            .par_chunks_exact_mut(4)
            .zip(mask.par_chunks_exact(4))
            .for_each(|(dst, src)| {
                let alpha = src[3] as u32;
                if alpha == 0 {
                    return;
                }
                for c in 0..3 {
                    dst[c] = blend(dst[c], src[c], alpha);
                }
            });

        for overlay in overlays {
            draw_overlay(&mut self.output, overlay);
        }

        &self.output
    }
}

fn blend(dst: u8, src: u8, alpha: u32) -> u8 {
    ((src as u32 * alpha + dst as u32 * (255 - alpha) + 127) / 255) as u8
}

fn draw_overlay(frame: &mut Frame, overlay: &Overlay) {
    let [rx, ry, rw, rh] = overlay.rect;
    if !(rw > 0.0) || !(rh > 0.0) {
        return;
    }
    let Some(inverse) = overlay.transform.inverse() else {
        log::trace!("skipping overlay with singular transform");
        return;
    };

    let corners = [
        overlay.transform.apply(rx, ry),
        overlay.transform.apply(rx + rw, ry),
        overlay.transform.apply(rx, ry + rh),
        overlay.transform.apply(rx + rw, ry + rh),
    ];
    let (min_x, max_x, min_y, max_y) = corners.iter().fold(
        (f32::MAX, f32::MIN, f32::MAX, f32::MIN),
        |acc, &(x, y)| (acc.0.min(x), acc.1.max(x), acc.2.min(y), acc.3.max(y)),
    );

    let x0 = min_x.floor().max(0.0) as i64;
    let y0 = min_y.floor().max(0.0) as i64;
    let x1 = (max_x.ceil() as i64).min(frame.width as i64);
    let y1 = (max_y.ceil() as i64).min(frame.height as i64);
    if x0 >= x1 || y0 >= y1 {
        log::trace!("overlay lies outside the frame");
        return;
    }
    let (x0, x1) = (x0 as usize, x1 as usize);

    let sprite = &overlay.sprite;
    let sx = sprite.width as f32 / rw;
    let sy = sprite.height as f32 / rh;
    let stride = frame.width as usize * 4;

    frame
        .bgra
        .par_chunks_exact_mut(stride)
        .enumerate()
        .skip(y0 as usize)
        .take((y1 - y0) as usize)
        .for_each(|(y, row)| {
            let py = y as f32 + 0.5;
            for x in x0..x1 {
                let (lx, ly) = inverse.apply(x as f32 + 0.5, py);
                if lx < rx || ly < ry || lx >= rx + rw || ly >= ry + rh {
                    continue;
                }
                let [b, g, r, a] = sprite.sample((lx - rx) * sx - 0.5, (ly - ry) * sy - 0.5);
                if a <= 0.0 {
                    continue;
                }
                let idx = x * 4;
                let px = &mut row[idx..idx + 4];
                let keep = 1.0 - a;
                px[0] = (b + px[0] as f32 * keep).round().clamp(0.0, 255.0) as u8;
                px[1] = (g + px[1] as f32 * keep).round().clamp(0.0, 255.0) as u8;
                px[2] = (r + px[2] as f32 * keep).round().clamp(0.0, 255.0) as u8;
            }
        });
}
