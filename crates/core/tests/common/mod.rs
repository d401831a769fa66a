//! Shared setup for integration tests

use compound_cloud_core::{CompoundCloudConfig, CompoundGrid, CompoundId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Route `tracing` output through the test harness (`RUST_LOG=debug cargo test`)
#[ctor::ctor]
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// 12x12 grid split into 3x3 sub-squares of 4 cells, one world unit per cell
#[allow(dead_code)]
pub fn small_config() -> CompoundCloudConfig {
    CompoundCloudConfig {
        size: 12,
        sub_squares_per_side: 3,
        resolution: 1.0,
        edge_width: 1,
        diffusion_rate: 0.4,
        ..Default::default()
    }
}

#[allow(dead_code)]
pub fn two_channel_grid(config: &CompoundCloudConfig) -> CompoundGrid {
    CompoundGrid::new(
        config,
        [Some(CompoundId(1)), Some(CompoundId(2)), None, None],
        [1.0; 4],
    )
    .expect("valid grid")
}

/// Fill both bound channels with random amounts in `[0, max)`
#[allow(dead_code)]
pub fn fill_random(grid: &CompoundGrid, seed: u64, max: f32) {
    let mut rng = StdRng::seed_from_u64(seed);
    let size = grid.size();
    for y in 0..size {
        for x in 0..size {
            for channel in 0..2 {
                grid.add(channel, x, y, rng.random_range(0.0..max))
                    .expect("in range");
            }
        }
    }
}
