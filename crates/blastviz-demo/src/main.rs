//! Headless demo that drives the blast-hole core through a camera zoom.
//!
//! A synthetic pattern is loaded into the instance allocator, the LOD manager
//! and the frustum culler; each frame moves the camera, reclassifies holes,
//! rebuilds the vector batches that changed and logs the resulting counts.
//!
//! Run with `cargo run -p blastviz-demo -- --holes 5000 --frames 12`.

mod pattern;

use std::time::Duration;

use blastviz_batch::{
    ColorValue, GroupKey, HoleInstances, InstancePart, InstanceShape, InstancedMeshManager, LineBatcher,
    MemoryScene, PickMeta, PointBatcher, ShapeKind, instance_transform,
};
use blastviz_config::{CliArgs, Config, default_config_dir};
use blastviz_cull::{FrustumCuller, Sphere};
use blastviz_lod::{LodBand, LodManager, ScreenScale, frame_budget, hole_extent};
use clap::Parser;
use glam::{Mat4, Vec3};
use tracing::{debug, info, warn};

use crate::pattern::{COLORS, DemoHole};

const DEFAULT_HOLES: usize = 2000;
const DEFAULT_FRAMES: u32 = 10;
const VIEWPORT_HEIGHT: f32 = 1080.0;
const FOV_Y: f32 = std::f32::consts::FRAC_PI_4;
const MARKER_SIZE: f32 = 6.0;

struct Viewer {
    holes: Vec<DemoHole>,
    instances: InstancedMeshManager,
    lines: LineBatcher,
    points: PointBatcher,
    lod: LodManager<u32>,
    culler: FrustumCuller<u32>,
    scene: MemoryScene,
    frame_budget: Duration,
    developer_mode: bool,
}

impl Viewer {
    fn new(config: &Config, holes: Vec<DemoHole>) -> Self {
        Self {
            holes,
            instances: InstancedMeshManager::from_config(&config.batching),
            lines: LineBatcher::from_config(&config.batching, &config.display),
            points: PointBatcher::from_config(&config.batching, &config.display),
            lod: LodManager::from_config(&config.lod),
            culler: FrustumCuller::new(),
            scene: MemoryScene::new(),
            frame_budget: frame_budget(&config.lod),
            developer_mode: config.display.developer_mode,
        }
    }

    fn load_pattern(&mut self) {
        for hole in &self.holes {
            let class = hole.diameter_class;
            let diameter = hole.diameter();
            let color = ColorValue::from(COLORS[class]).to_rgb().unwrap_or(0xffffff);
            let keys = [
                (InstancePart::Collar, ShapeKind::Disc),
                (InstancePart::Grade, ShapeKind::Ring),
                (InstancePart::Toe, ShapeKind::Sphere),
            ]
            .map(|(part, kind)| {
                let key = GroupKey::for_part(part, diameter);
                self.instances.get_or_create_group(
                    &key,
                    InstanceShape {
                        kind,
                        radius: diameter * 0.5,
                        color,
                        segments: 24,
                    },
                );
                key
            });
            let [collar_key, grade_key, toe_key] = keys;
            self.instances.add_hole(
                &hole.name,
                &HoleInstances {
                    collar: Some((collar_key, hole.collar)),
                    grade: Some((grade_key, hole.grade)),
                    toe: Some((toe_key, hole.toe)),
                    scale: 1.0,
                },
            );

            self.lod
                .insert(hole.id, hole_extent(hole.collar, hole.toe, diameter));
            self.culler
                .set_bounds(hole.id, Sphere::around_segment(hole.collar, hole.toe, diameter));
        }
        // Every hole starts in the lowest band; park what that band hides.
        for hole in &self.holes {
            apply_band(&mut self.instances, hole, LodBand::PointOnly);
        }
        let stats = self.instances.stats();
        info!(
            "Loaded {} holes into {} instance groups ({} slots allocated, capacity {})",
            stats.owners, stats.groups, stats.allocated, stats.capacity
        );
    }

    fn frame(&mut self, frame: u32, camera_distance: f32, target: Vec3) {
        let ppu = ScreenScale::perspective(FOV_Y, camera_distance).pixels_per_unit(VIEWPORT_HEIGHT);
        let view = Mat4::look_at_rh(target + Vec3::Z * camera_distance, target, Vec3::Y);
        let proj = Mat4::perspective_rh(FOV_Y, 16.0 / 9.0, 0.1, camera_distance * 4.0);

        let lod_update = self.lod.update(ppu, self.frame_budget);
        for (id, band) in self.lod.changes() {
            if let Some(hole) = self.holes.get(*id as usize) {
                apply_band(&mut self.instances, hole, *band);
            }
        }

        self.culler.update_frustum(&(proj * view));
        let cull = self.culler.apply();

        if lod_update.changed > 0 || cull.changed > 0 {
            self.rebuild_vectors();
        }

        let buffer_events = self.instances.drain_events().count();
        self.instances.mark_uploaded();

        let [point_only, point_track, simple, full] = self.lod.band_counts();
        let line_stats = self.lines.stats();
        let point_stats = self.points.stats();
        let instance_stats = self.instances.stats();
        let summary = format!(
            "frame {frame}: {ppu:.1} px/m, bands {point_only}/{point_track}/{simple}/{full}, \
             lod {} classified ({} changed{}), cull {}/{} visible, \
             draw calls {} instanced + {} line + {} point, {buffer_events} buffer events",
            lod_update.classified,
            lod_update.changed,
            if lod_update.complete { "" } else { ", sweep paused" },
            cull.visible,
            cull.tested,
            instance_stats.groups,
            line_stats.draw_calls,
            point_stats.draw_calls,
        );
        if self.developer_mode {
            info!("{summary}");
        } else {
            debug!("{summary}");
        }
    }

    /// Rebuild track lines, point markers and collar outlines for visible holes.
    fn rebuild_vectors(&mut self) {
        self.lines.clear();
        self.points.clear();
        for (id, band) in self.lod.iter() {
            if self.culler.is_visible(id) == Some(false) {
                continue;
            }
            let Some(hole) = self.holes.get(*id as usize) else {
                continue;
            };
            let color = COLORS[hole.diameter_class];
            if band.show_track_line() {
                self.lines.add_line_with_meta(
                    hole.collar,
                    hole.toe,
                    color,
                    1.0,
                    PickMeta::new(hole.name.as_str(), 0),
                );
            }
            if band.show_point_marker() {
                self.points.add_point_with_meta(
                    hole.collar,
                    color,
                    MARKER_SIZE,
                    PickMeta::new(hole.name.as_str(), 0),
                );
            }
            if band.show_labels() {
                // Label leader ring; black reads as white in dark mode.
                self.lines
                    .add_circle(hole.collar, hole.diameter() * 2.0, "black", 1.0, 0);
            }
        }
        let lines = self.lines.flush(&mut self.scene);
        let points = self.points.flush(&mut self.scene);
        debug!(
            "Rebuilt {lines} line and {points} point primitives, scene holds {}",
            self.scene.len()
        );
    }

    /// Delete every `stride`-th hole, then reclaim the slots they left behind.
    fn delete_holes(&mut self, stride: usize) {
        let mut removed = 0;
        for hole in self.holes.iter().step_by(stride.max(1)) {
            if self.instances.remove_owner(&hole.name) {
                removed += 1;
            }
            self.lod.remove(&hole.id);
            self.culler.remove(&hole.id);
        }
        if let Some(hole) = self.holes.first()
            && self.instances.owner_info(&hole.name).is_none()
        {
            debug!("{} is no longer registered", hole.name);
        }

        let hidden = self.instances.stats().hidden;
        let keys: Vec<GroupKey> = self.instances.groups().map(|group| group.key().clone()).collect();
        let reclaimed: usize = keys.iter().map(|key| self.instances.compact_group(key)).sum();
        info!("Removed {removed} holes: {hidden} slots hidden, {reclaimed} reclaimed by compaction");

        if let Some(group) = self.instances.groups().next()
            && let Some((owner, part)) = self.instances.owner_at(group.key(), 0)
        {
            info!("Pick {}[0] -> {owner} {}", group.key(), part.name());
        }
    }

    fn shutdown(&mut self) {
        self.lines.dispose(&mut self.scene);
        self.points.dispose(&mut self.scene);
        self.instances.clear_all();
        let destroyed = self.instances.drain_events().count();
        info!(
            "Shut down: {} primitives left in scene, {destroyed} buffers released",
            self.scene.len()
        );
    }
}

/// Show or park a hole's instanced parts for `band`.
fn apply_band(instances: &mut InstancedMeshManager, hole: &DemoHole, band: LodBand) {
    let parts = [
        (InstancePart::Collar, hole.collar, band.show_primary_shape()),
        (InstancePart::Grade, hole.grade, band.show_full_geometry()),
        (InstancePart::Toe, hole.toe, band.show_full_geometry()),
    ];
    for (part, position, shown) in parts {
        if shown {
            instances.show_instance(&hole.name, part, instance_transform(position, 1.0));
        } else {
            instances.hide_instance(&hole.name, part);
        }
    }
}

fn main() {
    let args = CliArgs::parse();

    // Resolve config directory
    let config_dir = args.config.clone().unwrap_or_else(default_config_dir);

    // Load or create config, then apply CLI overrides
    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);

    // Initialize logging with config and debug settings
    let log_dir = config_dir.join("logs");
    let log_dir = config.debug.log_to_file.then_some(log_dir.as_path());
    blastviz_log::init_logging(log_dir, cfg!(debug_assertions), Some(&config));

    if let Err(e) = config.validate() {
        warn!("{e}; invalid values fall back to defaults");
    }

    let hole_count = args.holes.unwrap_or(DEFAULT_HOLES);
    let frames = args.frames.unwrap_or(DEFAULT_FRAMES);
    let holes = pattern::generate(hole_count, 42);
    let target = pattern::centroid(&holes);

    let mut viewer = Viewer::new(&config, holes);
    viewer.load_pattern();

    // Start close to the bench and pull back until holes shrink to points.
    let mut distance = 15.0;
    for frame in 0..frames {
        viewer.frame(frame, distance, target);
        distance *= 1.6;
    }

    viewer.delete_holes(10);
    viewer.frame(frames, distance, target);
    viewer.shutdown();
}
