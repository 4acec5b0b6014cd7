use crate::{
    config::PostureThresholds,
    types::{JointType, PostureCode, Skeleton},
};

/// Joints every posture predicate reads. If any of them is untracked the
/// classifier answers `PostureCode::None`.
pub const REQUIRED_JOINTS: [JointType; 6] = [
    JointType::Head,
    JointType::ShoulderRight,
    JointType::ElbowRight,
    JointType::WristRight,
    JointType::ShoulderLeft,
    JointType::ElbowLeft,
];

#[derive(Clone, Debug, Default)]
pub struct PostureClassifier {
    thresholds: PostureThresholds,
}

impl PostureClassifier {
    pub fn new(thresholds: PostureThresholds) -> Self {
        Self { thresholds }
    }

    pub fn classify(&self, skeleton: &Skeleton) -> PostureCode {
        if REQUIRED_JOINTS
            .iter()
            .any(|&joint| !skeleton.joint(joint).is_tracked())
        {
            return PostureCode::None;
        }

        let t = &self.thresholds;
        let head = skeleton.joint(JointType::Head).position;
        let shoulder = skeleton.joint(JointType::ShoulderRight).position;
        let wrist = skeleton.joint(JointType::WristRight).position;
        let left_elbow = skeleton.joint(JointType::ElbowLeft).position;
        let left_shoulder = skeleton.joint(JointType::ShoulderLeft).position;

        let wrist_dir = skeleton.orientation(JointType::WristRight);
        let elbow_dir = skeleton.orientation(JointType::ElbowRight);

        // Elbow straight: both bones point the same way.
        let arm_straight = dot(wrist_dir.bone_axis(), elbow_dir.bone_axis()) > t.collinearity_min;
        let left_arm_down = left_elbow.y < left_shoulder.y;
        if !arm_straight || !left_arm_down {
            return PostureCode::None;
        }

        let off_axis = wrist_dir.m12().abs() + wrist_dir.m32().abs();
        if wrist.y > head.y && off_axis > t.wrist_rotation_min {
            return PostureCode::Pose1;
        }

        let dx = wrist.x - shoulder.x;
        let dy = wrist.y - shoulder.y;
        if dx >= t.reach_min && dy.abs() <= t.band {
            PostureCode::Pose2
        } else if -dy >= t.reach_min && dx.abs() <= t.band {
            PostureCode::Pose3
        } else if -dx >= t.reach_min && dy.abs() <= t.band {
            PostureCode::Pose4
        } else {
            PostureCode::None
        }
    }
}

fn dot(a: [f32; 3], b: [f32; 3]) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::{JointOrientation, JointTrackingState, SkeletonPoint, SkeletonTrackingState};

    pub(crate) const HEAD: SkeletonPoint = SkeletonPoint::new(0.0, 0.6, 2.0);
    pub(crate) const SHOULDER: SkeletonPoint = SkeletonPoint::new(0.2, 0.35, 2.0);

    /// Tracked skeleton with the right wrist at `wrist` and a raised, tilted
    /// wrist bone when `tilted` is set.
    pub(crate) fn skeleton_with_wrist(wrist: SkeletonPoint, tilted: bool) -> Skeleton {
        let mut s = Skeleton {
            tracking_state: SkeletonTrackingState::Tracked,
            tracking_id: 1,
            position: SkeletonPoint::new(0.0, 0.0, 2.0),
            ..Skeleton::default()
        };
        let tracked = JointTrackingState::Tracked;
        s.set_joint(JointType::Head, HEAD, tracked);
        s.set_joint(JointType::ShoulderRight, SHOULDER, tracked);
        s.set_joint(
            JointType::ElbowRight,
            SkeletonPoint::new((SHOULDER.x + wrist.x) / 2.0, (SHOULDER.y + wrist.y) / 2.0, 2.0),
            tracked,
        );
        s.set_joint(JointType::WristRight, wrist, tracked);
        s.set_joint(JointType::ShoulderLeft, SkeletonPoint::new(-0.2, 0.35, 2.0), tracked);
        s.set_joint(JointType::ElbowLeft, SkeletonPoint::new(-0.25, 0.1, 2.0), tracked);

        let bone = if tilted {
            JointOrientation::from_roll(0.6)
        } else {
            JointOrientation::IDENTITY
        };
        s.set_orientation(JointType::ElbowRight, bone);
        s.set_orientation(JointType::WristRight, bone);
        s
    }

    pub(crate) fn pose_skeleton(posture: PostureCode) -> Skeleton {
        match posture {
            PostureCode::Pose1 => skeleton_with_wrist(SkeletonPoint::new(0.45, 0.85, 2.0), true),
            PostureCode::Pose2 => skeleton_with_wrist(SkeletonPoint::new(0.75, 0.33, 2.0), false),
            PostureCode::Pose3 => skeleton_with_wrist(SkeletonPoint::new(0.18, -0.2, 2.0), false),
            PostureCode::Pose4 => skeleton_with_wrist(SkeletonPoint::new(-0.35, 0.37, 2.0), false),
            PostureCode::None => skeleton_with_wrist(SkeletonPoint::new(0.3, 0.3, 2.0), false),
        }
    }

    #[test]
    fn recognizes_each_pose() {
        let classifier = PostureClassifier::default();
        for posture in [
            PostureCode::Pose1,
            PostureCode::Pose2,
            PostureCode::Pose3,
            PostureCode::Pose4,
            PostureCode::None,
        ] {
            assert_eq!(classifier.classify(&pose_skeleton(posture)), posture);
        }
    }

    #[test]
    fn any_untracked_required_joint_yields_none() {
        let classifier = PostureClassifier::default();
        for joint in REQUIRED_JOINTS {
            let mut s = pose_skeleton(PostureCode::Pose1);
            let position = s.joint(joint).position;
            s.set_joint(joint, position, JointTrackingState::NotTracked);
            assert_eq!(classifier.classify(&s), PostureCode::None, "{joint:?}");
        }
    }

    #[test]
    fn inferred_joints_still_count() {
        let classifier = PostureClassifier::default();
        let mut s = pose_skeleton(PostureCode::Pose2);
        let position = s.joint(JointType::WristRight).position;
        s.set_joint(JointType::WristRight, position, JointTrackingState::Inferred);
        assert_eq!(classifier.classify(&s), PostureCode::Pose2);
    }

    #[test]
    fn bent_elbow_blocks_every_pose() {
        let classifier = PostureClassifier::default();
        let mut s = pose_skeleton(PostureCode::Pose1);
        s.set_orientation(JointType::ElbowRight, JointOrientation::from_roll(1.6));
        assert_eq!(classifier.classify(&s), PostureCode::None);
    }

    #[test]
    fn raised_left_arm_blocks_every_pose() {
        let classifier = PostureClassifier::default();
        let mut s = pose_skeleton(PostureCode::Pose1);
        s.set_joint(
            JointType::ElbowLeft,
            SkeletonPoint::new(-0.3, 0.5, 2.0),
            JointTrackingState::Tracked,
        );
        assert_eq!(classifier.classify(&s), PostureCode::None);
    }

    #[test]
    fn straight_up_arm_is_not_the_raised_pose() {
        let classifier = PostureClassifier::default();
        let s = skeleton_with_wrist(SkeletonPoint::new(0.2, 0.9, 2.0), false);
        assert_eq!(classifier.classify(&s), PostureCode::None);
    }

    #[test]
    fn thresholds_are_tunable() {
        let strict = PostureClassifier::new(PostureThresholds {
            wrist_rotation_min: 1.5,
            ..PostureThresholds::default()
        });
        assert_eq!(
            strict.classify(&pose_skeleton(PostureCode::Pose1)),
            PostureCode::None
        );
    }
}
