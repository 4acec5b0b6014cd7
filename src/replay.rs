use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use anyhow::{Result, anyhow};
use crossbeam_channel::{Receiver, Sender};

use crate::{
    pipeline::StreamFormats,
    types::{
        DepthFrame, DepthSample, Frame, FrameBundle, JointOrientation, JointTrackingState,
        JointType, Skeleton, SkeletonFrame, SkeletonPoint, SkeletonTrackingState,
    },
};

const FRAME_INTERVAL: Duration = Duration::from_millis(33);
const SUBJECT_TRACKING_ID: u32 = 42;
const SUBJECT_DEPTH_MM: u16 = 2000;
const BACKGROUND_DEPTH_MM: u16 = 3500;

const HEAD: SkeletonPoint = SkeletonPoint::new(0.0, 0.6, 2.0);
const RIGHT_SHOULDER: SkeletonPoint = SkeletonPoint::new(0.2, 0.35, 2.0);

/// Owned frame bundle as it travels between threads.
#[derive(Clone, Debug)]
pub struct SensorBundle {
    pub color: Option<Frame>,
    pub depth: Option<DepthFrame>,
    pub skeletons: Option<SkeletonFrame>,
    pub sound_source_angle: Option<f32>,
}

impl SensorBundle {
    pub fn as_bundle(&self) -> FrameBundle<'_> {
        FrameBundle {
            color: self.color.as_ref(),
            depth: self.depth.as_ref(),
            skeletons: self.skeletons.as_ref(),
            sound_source_angle: self.sound_source_angle,
        }
    }
}

/// One scripted wrist position, repeated for `ticks` frames.
#[derive(Clone, Copy, Debug)]
pub struct Waypoint {
    pub wrist: SkeletonPoint,
    /// Whether the wrist bone is tilted off the vertical.
    pub tilted: bool,
    pub ticks: usize,
}

impl Waypoint {
    const fn new(x: f32, y: f32, tilted: bool, ticks: usize) -> Self {
        Self {
            wrist: SkeletonPoint::new(x, y, 2.0),
            tilted,
            ticks,
        }
    }
}

/// A subject tracing one clockwise circle with the right wrist and holding
/// the raised pose at the end.
pub fn arm_circle_script() -> Vec<Waypoint> {
    vec![
        Waypoint::new(0.3, 0.0, false, 10),
        Waypoint::new(0.45, 0.85, true, 4),
        Waypoint::new(0.6, 0.6, false, 1),
        Waypoint::new(0.75, 0.33, false, 3),
        Waypoint::new(0.55, 0.0, false, 1),
        Waypoint::new(0.18, -0.2, false, 3),
        Waypoint::new(-0.15, 0.0, false, 1),
        Waypoint::new(-0.35, 0.37, false, 1),
        Waypoint::new(-0.3, 0.7, false, 1),
        Waypoint::new(0.1, 0.8, false, 1),
        Waypoint::new(0.45, 0.85, true, 4),
        Waypoint::new(0.3, 0.0, false, 10),
    ]
}

/// Synthesizes time-aligned bundles for a single subject standing in front of
/// a flat background.
pub struct ReplayScene {
    formats: StreamFormats,
    color: Frame,
    depth: DepthFrame,
}

impl ReplayScene {
    pub fn new(formats: StreamFormats) -> Self {
        let mut color = Frame::blank(formats.color.width(), formats.color.height());
        let width = color.width as usize;
        let height = color.height as usize;
        for (i, px) in color.bgra.chunks_exact_mut(4).enumerate() {
            let (x, y) = (i % width, i / width);
            px[0] = (x * 255 / width) as u8;
            px[1] = (y * 255 / height) as u8;
            px[2] = 96;
            px[3] = 255;
        }

        let mut depth = DepthFrame::filled(formats.depth, DepthSample::new(BACKGROUND_DEPTH_MM, 0));
        let (dw, dh) = (formats.depth.width() as usize, formats.depth.height() as usize);
        let body = (dw * 2 / 5..dw * 3 / 5, dh / 4..dh);
        for y in body.1.clone() {
            for x in body.0.clone() {
                depth.samples[y * dw + x] = DepthSample::new(SUBJECT_DEPTH_MM, 1);
            }
        }

        Self {
            formats,
            color,
            depth,
        }
    }

    pub fn formats(&self) -> StreamFormats {
        self.formats
    }

    pub fn bundle(&self, waypoint: &Waypoint) -> SensorBundle {
        let now = Instant::now();
        let mut color = self.color.clone();
        color.timestamp = now;
        let mut depth = self.depth.clone();
        depth.timestamp = now;

        let mut skeletons = SkeletonFrame::default();
        skeletons.skeletons[0] = subject_skeleton(waypoint);

        SensorBundle {
            color: Some(color),
            depth: Some(depth),
            skeletons: Some(skeletons),
            sound_source_angle: Some(0.0),
        }
    }
}

fn subject_skeleton(waypoint: &Waypoint) -> Skeleton {
    let mut s = Skeleton {
        tracking_state: SkeletonTrackingState::Tracked,
        tracking_id: SUBJECT_TRACKING_ID,
        position: SkeletonPoint::new(0.0, 0.0, 2.0),
        ..Skeleton::default()
    };
    let tracked = JointTrackingState::Tracked;
    let wrist = waypoint.wrist;
    s.set_joint(JointType::Head, HEAD, tracked);
    s.set_joint(JointType::ShoulderCenter, SkeletonPoint::new(0.0, 0.4, 2.0), tracked);
    s.set_joint(JointType::ShoulderRight, RIGHT_SHOULDER, tracked);
    s.set_joint(
        JointType::ElbowRight,
        SkeletonPoint::new(
            (RIGHT_SHOULDER.x + wrist.x) / 2.0,
            (RIGHT_SHOULDER.y + wrist.y) / 2.0,
            2.0,
        ),
        tracked,
    );
    s.set_joint(JointType::WristRight, wrist, tracked);
    s.set_joint(JointType::ShoulderLeft, SkeletonPoint::new(-0.2, 0.35, 2.0), tracked);
    s.set_joint(JointType::ElbowLeft, SkeletonPoint::new(-0.25, 0.1, 2.0), tracked);
    s.set_joint(JointType::WristLeft, SkeletonPoint::new(-0.27, -0.15, 2.0), tracked);

    let bone = if waypoint.tilted {
        JointOrientation::from_roll(0.6)
    } else {
        JointOrientation::IDENTITY
    };
    s.set_orientation(JointType::ElbowRight, bone);
    s.set_orientation(JointType::WristRight, bone);
    s.set_orientation(JointType::Head, JointOrientation::from_roll(0.15));
    s
}

#[derive(Debug)]
pub struct ReplayStream {
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl ReplayStream {
    pub fn stop(mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ReplayStream {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Plays `script` on a background thread, one bundle per frame interval. The
/// sender is dropped when the script ends, which closes the channel.
pub fn start_replay(
    scene: ReplayScene,
    script: Vec<Waypoint>,
    bundle_tx: Sender<SensorBundle>,
) -> Result<ReplayStream> {
    if script.iter().all(|w| w.ticks == 0) {
        return Err(anyhow!("replay script has no ticks"));
    }

    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = stop.clone();

    let handle = thread::spawn(move || {
        let ticks = script
            .iter()
            .flat_map(|w| std::iter::repeat_n(w, w.ticks));
        for waypoint in ticks {
            if stop_flag.load(Ordering::Relaxed) {
                break;
            }
            let tick_start = Instant::now();
            if bundle_tx.send(scene.bundle(waypoint)).is_err() {
                log::debug!("replay receiver closed, stopping");
                break;
            }
            if let Some(rest) = FRAME_INTERVAL.checked_sub(tick_start.elapsed()) {
                thread::sleep(rest);
            }
        }
        log::info!("replay finished");
    });

    Ok(ReplayStream {
        stop,
        handle: Some(handle),
    })
}

/// Blocks for the next bundle, then skips ahead to the newest one queued.
pub fn recv_latest_bundle(bundle_rx: &Receiver<SensorBundle>) -> Option<SensorBundle> {
    let mut bundle = bundle_rx.recv().ok()?;
    while let Ok(newer) = bundle_rx.try_recv() {
        bundle = newer;
    }
    Some(bundle)
}
