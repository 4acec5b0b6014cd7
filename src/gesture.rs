use crate::{
    config::{GestureConfig, SubjectKeying},
    types::{JointType, PostureCode, SKELETON_COUNT, Skeleton},
};

/// Progress through the arm circle: raised, swept right, lowered, swept left,
/// raised again.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum GestureStage {
    #[default]
    Idle,
    Raised,
    Right,
    Down,
    Left,
    Armed,
}

impl GestureStage {
    pub fn index(self) -> u8 {
        self as u8
    }

    /// Posture that moves this stage forward (or re-fires when armed).
    pub fn expected_posture(self) -> PostureCode {
        match self {
            GestureStage::Idle => PostureCode::Pose1,
            GestureStage::Raised => PostureCode::Pose2,
            GestureStage::Right => PostureCode::Pose3,
            GestureStage::Down => PostureCode::Pose4,
            GestureStage::Left => PostureCode::Pose1,
            GestureStage::Armed => PostureCode::Pose1,
        }
    }

    fn next(self) -> GestureStage {
        match self {
            GestureStage::Idle => GestureStage::Raised,
            GestureStage::Raised => GestureStage::Right,
            GestureStage::Right => GestureStage::Down,
            GestureStage::Down => GestureStage::Left,
            GestureStage::Left | GestureStage::Armed => GestureStage::Armed,
        }
    }
}

/// Whether the right wrist is still travelling along the circle for `stage`.
///
/// The center of the circle is the right shoulder. `play` is how far the
/// wrist may move against the expected direction between two ticks.
pub fn check_continuity(
    current: &Skeleton,
    stage: GestureStage,
    previous: Option<&Skeleton>,
    play: f32,
) -> bool {
    let Some(previous) = previous else {
        return false;
    };
    let joints = [JointType::Head, JointType::ShoulderRight, JointType::WristRight];
    if joints
        .iter()
        .any(|&j| !current.joint(j).is_tracked() || !previous.joint(j).is_tracked())
    {
        return false;
    }

    let head = current.joint(JointType::Head).position;
    let center = current.joint(JointType::ShoulderRight).position;
    let wrist = current.joint(JointType::WristRight).position;
    let prev = previous.joint(JointType::WristRight).position;

    match stage {
        GestureStage::Raised => wrist.x > center.x && wrist.y - prev.y <= play,
        GestureStage::Right => wrist.y < center.y && wrist.x - prev.x <= play,
        GestureStage::Down => wrist.x < center.x && prev.y - wrist.y <= play,
        GestureStage::Left => head.y < wrist.y && prev.x - wrist.x <= play,
        GestureStage::Idle | GestureStage::Armed => false,
    }
}

/// Recognizer for one subject.
#[derive(Clone, Debug)]
pub struct GestureStateMachine {
    stage: GestureStage,
    last_skeleton: Option<Skeleton>,
    motion_play: f32,
}

impl GestureStateMachine {
    pub fn new(motion_play: f32) -> Self {
        Self {
            stage: GestureStage::Idle,
            last_skeleton: None,
            motion_play,
        }
    }

    pub fn stage(&self) -> GestureStage {
        self.stage
    }

    pub fn reset(&mut self) {
        self.stage = GestureStage::Idle;
        self.last_skeleton = None;
    }

    /// Feeds one tick. Returns true only when the machine was armed and the
    /// raised pose is seen again.
    pub fn update(&mut self, skeleton: &Skeleton, posture: PostureCode) -> bool {
        let entering = self.stage;
        let fired = entering == GestureStage::Armed && posture == PostureCode::Pose1;

        let next = if posture == entering.expected_posture() {
            entering.next()
        } else if check_continuity(
            skeleton,
            entering,
            self.last_skeleton.as_ref(),
            self.motion_play,
        ) {
            entering
        } else {
            GestureStage::Idle
        };

        if next != entering {
            log::debug!(
                "gesture stage {:?} -> {:?} on {:?}",
                entering,
                next,
                posture
            );
        }
        self.stage = next;

        match &mut self.last_skeleton {
            Some(last) => last.clone_from(skeleton),
            None => self.last_skeleton = Some(skeleton.clone()),
        }

        fired
    }
}

/// Outcome of feeding one slot for a tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SlotUpdate {
    pub stage: GestureStage,
    pub fired: bool,
}

/// Fixed set of recognizers, one per skeleton slot.
pub struct GestureTracker {
    machines: [GestureStateMachine; SKELETON_COUNT],
    owners: [Option<u32>; SKELETON_COUNT],
    keying: SubjectKeying,
}

impl GestureTracker {
    pub fn new(cfg: &GestureConfig) -> Self {
        Self {
            machines: std::array::from_fn(|_| GestureStateMachine::new(cfg.motion_play)),
            owners: [None; SKELETON_COUNT],
            keying: cfg.keying,
        }
    }

    pub fn stage(&self, slot: usize) -> GestureStage {
        self.machines[slot].stage()
    }

    pub fn observe(
        &mut self,
        slot: usize,
        skeleton: &Skeleton,
        posture: PostureCode,
    ) -> SlotUpdate {
        if self.keying == SubjectKeying::TrackingId {
            if let Some(owner) = self.owners[slot] {
                if owner != skeleton.tracking_id {
                    log::debug!(
                        "slot {slot} changed subject {owner} -> {}, resetting gesture",
                        skeleton.tracking_id
                    );
                    self.machines[slot].reset();
                }
            }
            self.owners[slot] = Some(skeleton.tracking_id);
        }

        let machine = &mut self.machines[slot];
        let fired = machine.update(skeleton, posture);
        if fired {
            log::info!(
                "gesture completed by subject {} in slot {slot}",
                skeleton.tracking_id
            );
        }
        SlotUpdate {
            stage: machine.stage(),
            fired,
        }
    }

    /// Called for slots with no tracked subject this tick.
    pub fn vacate(&mut self, slot: usize) {
        if self.keying == SubjectKeying::TrackingId && self.owners[slot].take().is_some() {
            self.machines[slot].reset();
        }
    }
}
