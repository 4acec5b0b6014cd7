use std::{path::Path, sync::Arc};

use anyhow::{Context, Result};
use crossbeam_channel::bounded;
use skeleton_fusion::{
    FusionConfig, FusionPipeline, NominalMapper, Sprites,
    overlay::Sprite,
    replay::{ReplayScene, arm_circle_script, recv_latest_bundle, start_replay},
    types::Frame,
};

fn main() -> Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let snapshot_path = args.next();
    let sprite_path = args.next();

    let mut cfg = FusionConfig::default();
    cfg.features.head_pointer = true;
    cfg.features.callout = true;

    let resolution = cfg.overlay.sprite_resolution;
    let head = match &sprite_path {
        Some(path) => load_sprite(Path::new(path), resolution)?,
        None => Sprite::disc(resolution, [250, 204, 21, 230])?,
    };
    let sprites = Sprites {
        head: Arc::new(head),
        callout: Some(Arc::new(Sprite::disc(resolution, [255, 255, 255, 220])?)),
    };

    let scene = ReplayScene::new(Default::default());
    let mut pipeline =
        FusionPipeline::new(cfg, scene.formats(), NominalMapper::default(), sprites)?;

    let (bundle_tx, bundle_rx) = bounded(1);
    let stream = start_replay(scene, arm_circle_script(), bundle_tx)?;

    let mut ticks = 0usize;
    let mut fired = 0usize;
    while let Some(bundle) = recv_latest_bundle(&bundle_rx) {
        match pipeline.tick(&bundle.as_bundle()) {
            Ok(report) => {
                ticks += 1;
                for subject in report.fired() {
                    fired += 1;
                    log::info!(
                        "subject {} completed the arm circle (slot {})",
                        subject.tracking_id,
                        subject.slot
                    );
                }
                if let Some(pointer) = report.pointer {
                    log::trace!("pointer delta ({}, {})", pointer.dx, pointer.dy);
                }
            }
            Err(err) => {
                log::warn!("dropping tick: {err}");
            }
        }
    }
    stream.stop();

    println!("processed {ticks} ticks, gesture fired {fired} times");

    if let Some(path) = snapshot_path {
        save_frame(Path::new(&path), pipeline.output())?;
        println!("saved last composited frame to {path}");
    }

    Ok(())
}

fn load_sprite(path: &Path, resolution: u32) -> Result<Sprite> {
    let image = image::open(path)
        .with_context(|| format!("failed to open sprite {}", path.display()))?
        .to_rgba8();
    Sprite::from_image(&image, resolution)
        .with_context(|| format!("failed to prepare sprite {}", path.display()))
}

fn save_frame(path: &Path, frame: &Frame) -> Result<()> {
    let mut rgba = frame.bgra.clone();
    for px in rgba.chunks_exact_mut(4) {
        px.swap(0, 2);
        px[3] = 255;
    }
    image::save_buffer(
        path,
        &rgba,
        frame.width,
        frame.height,
        image::ExtendedColorType::Rgba8,
    )
    .with_context(|| format!("failed to write {}", path.display()))
}
