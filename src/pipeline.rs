use std::sync::Arc;

use crate::{
    compositor::FrameCompositor,
    config::FusionConfig,
    error::{FusionError, Result},
    gesture::{GestureStage, GestureTracker, SlotUpdate},
    head_pointer::{PointerDelta, pointer_delta},
    mapper::CoordinateMapper,
    mask::OcclusionMaskBuilder,
    overlay::{Overlay, Sprite, callout_overlay, callout_visible, head_overlay, overlay_size},
    posture::PostureClassifier,
    types::{
        ColorImageFormat, ColorPoint, DepthImageFormat, Frame, FrameBundle, JointType,
        PostureCode, SKELETON_COUNT, SkeletonFrame,
    },
};

#[derive(Clone, Copy, Debug)]
pub struct StreamFormats {
    pub color: ColorImageFormat,
    pub depth: DepthImageFormat,
}

impl Default for StreamFormats {
    fn default() -> Self {
        Self {
            color: ColorImageFormat::Rgb640x480Fps30,
            depth: DepthImageFormat::Resolution320x240Fps30,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Sprites {
    pub head: Arc<Sprite>,
    pub callout: Option<Arc<Sprite>>,
}

/// Per-subject result of a tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubjectSignal {
    pub slot: usize,
    pub tracking_id: u32,
    pub posture: PostureCode,
    pub stage: GestureStage,
    pub fired: bool,
    /// Projected head position, or `ColorPoint::SENTINEL` when the head is untracked.
    pub head: ColorPoint,
}

pub struct TickReport<'a> {
    pub frame: &'a Frame,
    pub subjects: &'a [SubjectSignal],
    pub pointer: Option<PointerDelta>,
}

impl TickReport<'_> {
    pub fn fired(&self) -> impl Iterator<Item = &SubjectSignal> {
        self.subjects.iter().filter(|s| s.fired)
    }
}

/// Everything one sensor stream needs, allocated when the stream starts and
/// reused for every tick. Ticks must be serialized by the owner.
pub struct FusionPipeline<M: CoordinateMapper> {
    cfg: FusionConfig,
    formats: StreamFormats,
    mapper: M,
    mask: OcclusionMaskBuilder,
    compositor: FrameCompositor,
    classifier: PostureClassifier,
    tracker: GestureTracker,
    sprites: Sprites,
    overlays: Vec<Overlay>,
    subjects: Vec<SubjectSignal>,
}

impl<M: CoordinateMapper> FusionPipeline<M> {
    pub fn new(
        cfg: FusionConfig,
        formats: StreamFormats,
        mapper: M,
        sprites: Sprites,
    ) -> Result<Self> {
        cfg.validate()?;
        sprites.head.validate()?;
        if let Some(callout) = &sprites.callout {
            callout.validate()?;
        }
        log::info!(
            "fusion pipeline ready: color {:?}, depth {:?}, features {:?}",
            formats.color,
            formats.depth,
            cfg.features
        );

        Ok(Self {
            mask: OcclusionMaskBuilder::new(formats.color, formats.depth, &cfg.mask),
            compositor: FrameCompositor::new(formats.color),
            classifier: PostureClassifier::new(cfg.posture.clone()),
            tracker: GestureTracker::new(&cfg.gesture),
            overlays: Vec::with_capacity(SKELETON_COUNT * 2),
            subjects: Vec::with_capacity(SKELETON_COUNT),
            cfg,
            formats,
            mapper,
            sprites,
        })
    }

    /// Most recent composited frame.
    pub fn output(&self) -> &Frame {
        self.compositor.output()
    }

    pub fn stage(&self, slot: usize) -> GestureStage {
        self.tracker.stage(slot)
    }

    /// Runs one tick. On error nothing has been modified and the caller should
    /// keep showing its previous frame.
    pub fn tick(&mut self, bundle: &FrameBundle<'_>) -> Result<TickReport<'_>> {
        let color = bundle
            .color
            .ok_or(FusionError::BundleIncomplete { missing: "color" })?;
        let skeletons = bundle
            .skeletons
            .ok_or(FusionError::BundleIncomplete { missing: "skeleton" })?;
        let depth = if self.cfg.features.occlusion_mask {
            Some(
                bundle
                    .depth
                    .ok_or(FusionError::BundleIncomplete { missing: "depth" })?,
            )
        } else {
            None
        };

        let (width, height) = (self.formats.color.width(), self.formats.color.height());
        if color.width != width
            || color.height != height
            || color.bgra.len() != color.expected_len()
        {
            return Err(FusionError::FrameSizeMismatch {
                got_width: color.width,
                got_height: color.height,
                got_len: color.bgra.len(),
                width,
                height,
            });
        }
        if let Some(depth) = depth {
            let expected = self.formats.depth.pixel_count();
            if depth.format != self.formats.depth || depth.samples.len() != expected {
                return Err(FusionError::DepthSizeMismatch {
                    got: depth.samples.len(),
                    expected,
                });
            }
        }

        let pointer = self.process_subjects(skeletons, bundle.sound_source_angle);

        let mask = match depth {
            Some(depth) => self.mask.build(depth, &self.mapper)?,
            None => self.mask.clear(),
        };
        let frame = self.compositor.compose(color, mask, &self.overlays);

        Ok(TickReport {
            frame,
            subjects: &self.subjects,
            pointer,
        })
    }

    fn process_subjects(
        &mut self,
        skeletons: &SkeletonFrame,
        sound_source_angle: Option<f32>,
    ) -> Option<PointerDelta> {
        self.overlays.clear();
        self.subjects.clear();
        let features = &self.cfg.features;
        let mut pointer = None;

        for (slot, skeleton) in skeletons.skeletons.iter().enumerate() {
            if !skeleton.is_tracked() {
                if features.gesture_signal {
                    self.tracker.vacate(slot);
                }
                continue;
            }

            let posture = self.classifier.classify(skeleton);
            let update = if features.gesture_signal {
                self.tracker.observe(slot, skeleton, posture)
            } else {
                SlotUpdate::default()
            };

            let head = skeleton.joint(JointType::Head);
            let mut anchor = ColorPoint::SENTINEL;
            if head.is_tracked() {
                anchor = self
                    .mapper
                    .map_skeleton_point_to_color(head.position, self.formats.color);
                let orientation = skeleton.orientation(JointType::Head);

                let size = overlay_size(
                    head.position.z,
                    posture,
                    &self.cfg.overlay,
                    features.posture_overlay,
                );
                self.overlays
                    .extend(head_overlay(&self.sprites.head, anchor, orientation, size));

                if features.callout
                    && callout_visible(head.position, sound_source_angle, &self.cfg.overlay)
                {
                    if let Some(sprite) = &self.sprites.callout {
                        self.overlays
                            .extend(callout_overlay(sprite, anchor, &self.cfg.overlay));
                    }
                }

                if features.head_pointer && pointer.is_none() {
                    pointer = Some(pointer_delta(orientation, &self.cfg.pointer));
                }
            }

            self.subjects.push(SubjectSignal {
                slot,
                tracking_id: skeleton.tracking_id,
                posture,
                stage: update.stage,
                fired: update.fired,
                head: anchor,
            });
        }

        pointer
    }
}
