use std::time::Instant;

/// Number of skeleton slots the sensor reports per frame.
pub const SKELETON_COUNT: usize = 6;

pub const PLAYER_INDEX_BITMASK: u16 = 0x0007;
pub const PLAYER_INDEX_BITMASK_WIDTH: u16 = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorImageFormat {
    Rgb640x480Fps30,
    Rgb1280x960Fps12,
}

impl ColorImageFormat {
    pub fn width(&self) -> u32 {
        match self {
            ColorImageFormat::Rgb640x480Fps30 => 640,
            ColorImageFormat::Rgb1280x960Fps12 => 1280,
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            ColorImageFormat::Rgb640x480Fps30 => 480,
            ColorImageFormat::Rgb1280x960Fps12 => 960,
        }
    }

    pub fn pixel_count(&self) -> usize {
        self.width() as usize * self.height() as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DepthImageFormat {
    Resolution640x480Fps30,
    Resolution320x240Fps30,
    Resolution80x60Fps30,
}

impl DepthImageFormat {
    pub fn width(&self) -> u32 {
        match self {
            DepthImageFormat::Resolution640x480Fps30 => 640,
            DepthImageFormat::Resolution320x240Fps30 => 320,
            DepthImageFormat::Resolution80x60Fps30 => 80,
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            DepthImageFormat::Resolution640x480Fps30 => 480,
            DepthImageFormat::Resolution320x240Fps30 => 240,
            DepthImageFormat::Resolution80x60Fps30 => 60,
        }
    }

    pub fn pixel_count(&self) -> usize {
        self.width() as usize * self.height() as usize
    }
}

/// A BGRA frame as delivered by the color stream or produced by the compositor.
#[derive(Clone, Debug)]
pub struct Frame {
    pub bgra: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: Instant,
}

impl Frame {
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            bgra: vec![0u8; width as usize * height as usize * 4],
            width,
            height,
            timestamp: Instant::now(),
        }
    }

    pub fn expected_len(&self) -> usize {
        (self.width as usize)
            .saturating_mul(self.height as usize)
            .saturating_mul(4)
    }
}

/// Packed depth value: the low bits carry the player index, the rest the
/// distance in millimeters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DepthSample(pub u16);

impl DepthSample {
    /// Largest distance the packed format can hold.
    pub const MAX_DEPTH_MM: u16 = u16::MAX >> PLAYER_INDEX_BITMASK_WIDTH;

    /// Packs a sample. Distances beyond `MAX_DEPTH_MM` saturate and player
    /// indices keep only their low three bits.
    pub fn new(depth_mm: u16, player_index: u8) -> Self {
        let depth = depth_mm.min(Self::MAX_DEPTH_MM);
        let player = player_index as u16 & PLAYER_INDEX_BITMASK;
        Self((depth << PLAYER_INDEX_BITMASK_WIDTH) | player)
    }

    pub fn depth_mm(&self) -> u16 {
        self.0 >> PLAYER_INDEX_BITMASK_WIDTH
    }

    pub fn player_index(&self) -> u8 {
        (self.0 & PLAYER_INDEX_BITMASK) as u8
    }

    pub fn has_player(&self) -> bool {
        self.player_index() != 0
    }
}

#[derive(Clone, Debug)]
pub struct DepthFrame {
    pub samples: Vec<DepthSample>,
    pub format: DepthImageFormat,
    pub timestamp: Instant,
}

impl DepthFrame {
    pub fn filled(format: DepthImageFormat, sample: DepthSample) -> Self {
        Self {
            samples: vec![sample; format.pixel_count()],
            format,
            timestamp: Instant::now(),
        }
    }
}

/// A cell of the depth grid together with its packed sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DepthPoint {
    pub x: u32,
    pub y: u32,
    pub sample: DepthSample,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SkeletonPoint {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl SkeletonPoint {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Pixel position in color space. May lie outside the frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ColorPoint {
    pub x: i32,
    pub y: i32,
}

impl ColorPoint {
    /// Returned by mappers for inputs they cannot project.
    pub const SENTINEL: ColorPoint = ColorPoint { x: -1, y: -1 };

    pub fn pixel_index(&self, width: u32, height: u32) -> Option<usize> {
        if self.x < 0 || self.y < 0 {
            return None;
        }
        let (ux, uy) = (self.x as u32, self.y as u32);
        if ux >= width || uy >= height {
            return None;
        }
        Some(uy as usize * width as usize + ux as usize)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JointTrackingState {
    #[default]
    NotTracked,
    Inferred,
    Tracked,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SkeletonTrackingState {
    #[default]
    NotTracked,
    PositionOnly,
    Tracked,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum JointType {
    HipCenter,
    Spine,
    ShoulderCenter,
    Head,
    ShoulderLeft,
    ElbowLeft,
    WristLeft,
    HandLeft,
    ShoulderRight,
    ElbowRight,
    WristRight,
    HandRight,
    HipLeft,
    KneeLeft,
    AnkleLeft,
    FootLeft,
    HipRight,
    KneeRight,
    AnkleRight,
    FootRight,
}

impl JointType {
    pub const COUNT: usize = 20;

    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Joint {
    pub position: SkeletonPoint,
    pub tracking_state: JointTrackingState,
}

impl Joint {
    pub fn is_tracked(&self) -> bool {
        self.tracking_state != JointTrackingState::NotTracked
    }
}

/// Absolute joint rotation as a row-major 4x4 matrix. `m[r][c]` is `M{r+1}{c+1}`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct JointOrientation {
    pub m: [[f32; 4]; 4],
}

impl Default for JointOrientation {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl JointOrientation {
    pub const IDENTITY: JointOrientation = JointOrientation {
        m: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    /// Rotation about the sensor's Z axis, i.e. in the image plane.
    pub fn from_roll(angle: f32) -> Self {
        let (sin, cos) = angle.sin_cos();
        let mut m = Self::IDENTITY.m;
        m[0][0] = cos;
        m[0][1] = sin;
        m[1][0] = -sin;
        m[1][1] = cos;
        Self { m }
    }

    pub fn m11(&self) -> f32 {
        self.m[0][0]
    }
    pub fn m12(&self) -> f32 {
        self.m[0][1]
    }
    pub fn m21(&self) -> f32 {
        self.m[1][0]
    }
    pub fn m22(&self) -> f32 {
        self.m[1][1]
    }
    pub fn m23(&self) -> f32 {
        self.m[1][2]
    }
    pub fn m32(&self) -> f32 {
        self.m[2][1]
    }

    /// Second column: the bone's Y axis expressed in sensor space.
    pub fn bone_axis(&self) -> [f32; 3] {
        [self.m[0][1], self.m[1][1], self.m[2][1]]
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Skeleton {
    pub tracking_state: SkeletonTrackingState,
    pub tracking_id: u32,
    pub position: SkeletonPoint,
    pub joints: [Joint; JointType::COUNT],
    pub orientations: [JointOrientation; JointType::COUNT],
}

impl Skeleton {
    pub fn joint(&self, joint: JointType) -> &Joint {
        &self.joints[joint.index()]
    }

    pub fn orientation(&self, joint: JointType) -> &JointOrientation {
        &self.orientations[joint.index()]
    }

    pub fn set_joint(
        &mut self,
        joint: JointType,
        position: SkeletonPoint,
        state: JointTrackingState,
    ) {
        self.joints[joint.index()] = Joint {
            position,
            tracking_state: state,
        };
    }

    pub fn set_orientation(&mut self, joint: JointType, orientation: JointOrientation) {
        self.orientations[joint.index()] = orientation;
    }

    pub fn is_tracked(&self) -> bool {
        self.tracking_state == SkeletonTrackingState::Tracked
    }
}

/// One tick's worth of skeleton slots.
#[derive(Clone, Debug, Default)]
pub struct SkeletonFrame {
    pub skeletons: [Skeleton; SKELETON_COUNT],
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PostureCode {
    #[default]
    None,
    Pose1,
    Pose2,
    Pose3,
    Pose4,
}

/// A synchronized arrival from the sensor. Missing streams mark the bundle
/// incomplete.
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameBundle<'a> {
    pub color: Option<&'a Frame>,
    pub depth: Option<&'a DepthFrame>,
    pub skeletons: Option<&'a SkeletonFrame>,
    /// Sound source angle in degrees, already filtered by confidence.
    pub sound_source_angle: Option<f32>,
}
