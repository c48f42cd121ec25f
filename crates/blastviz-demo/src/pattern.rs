//! Synthetic blast pattern used to drive the demo.

use glam::Vec3;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;

/// Drill bit diameters in metres.
pub const DIAMETERS: [f32; 3] = [0.089, 0.115, 0.165];

/// Display colors per diameter class.
pub const COLORS: [&str; 3] = ["#ff0000", "lime", "0x0000ff"];

/// One generated hole.
#[derive(Clone, Debug)]
pub struct DemoHole {
    pub id: u32,
    pub name: String,
    pub collar: Vec3,
    pub grade: Vec3,
    pub toe: Vec3,
    pub diameter_class: usize,
}

impl DemoHole {
    pub fn diameter(&self) -> f32 {
        DIAMETERS[self.diameter_class]
    }
}

/// A rectangular pattern on a bench at z = 0, holes drilled straight down
/// with a little jitter and 1 m of subdrill below grade.
pub fn generate(count: usize, seed: u64) -> Vec<DemoHole> {
    let mut rng = Xoshiro256StarStar::seed_from_u64(seed);
    let columns = (count as f32).sqrt().ceil().max(1.0) as usize;
    let (burden, spacing) = (4.0_f32, 5.0_f32);

    (0..count)
        .map(|n| {
            let row = n / columns;
            let col = n % columns;
            let jitter = Vec3::new(rng.gen_range(-0.3..0.3), rng.gen_range(-0.3..0.3), 0.0);
            let collar = Vec3::new(col as f32 * spacing, row as f32 * burden, 0.0) + jitter;
            let bench = rng.gen_range(8.0..15.0);
            let grade = collar - Vec3::Z * bench;
            let toe = grade - Vec3::Z;
            DemoHole {
                id: n as u32,
                name: format!("Pattern1:::{}", n + 1),
                collar,
                grade,
                toe,
                diameter_class: rng.gen_range(0..DIAMETERS.len()),
            }
        })
        .collect()
}

/// Center of the collars.
pub fn centroid(holes: &[DemoHole]) -> Vec3 {
    if holes.is_empty() {
        return Vec3::ZERO;
    }
    holes.iter().map(|hole| hole.collar).sum::<Vec3>() / holes.len() as f32
}
