use anyhow::{Context, Result};

use vio_sim_frontend::config::{FrontendParams, NoiseParams, SimParams};
use vio_sim_frontend::estimator::DeadReckoningEstimator;
use vio_sim_frontend::frontend::selection::{PassthroughSelector, SelectionCriterion};
use vio_sim_frontend::io::SimDataset;
use vio_sim_frontend::system::SimulationPipeline;

// Usage: vio-sim-frontend <dataset/mav0> [criterion] [seed] [lazy]
// where criterion is 0 (quality), 1 (min eig) or 2 (logdet), and lazy is 0 or 1.
fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().collect();
    let dataset_path = args
        .get(1)
        .cloned()
        .unwrap_or_else(|| "data/sim/Square_01_easy/mav0".to_string());

    let mut frontend = FrontendParams::default();
    if let Some(flag) = args.get(2) {
        let flag: u32 = flag.parse().context("criterion must be 0, 1 or 2")?;
        frontend.criterion = SelectionCriterion::from_flag(flag);
    }

    let mut sim = SimParams::default();
    if let Some(seed) = args.get(3) {
        sim.seed = seed.parse().context("seed must be an integer")?;
    }

    if let Some(lazy) = args.get(4) {
        frontend.lazy_evaluation = lazy != "0";
    }

    println!(
        "vio-sim-frontend: dataset = {}, criterion = {:?}, seed = {}, lazy = {}",
        dataset_path, frontend.criterion, sim.seed, frontend.lazy_evaluation
    );

    let dataset = SimDataset::new(&dataset_path)
        .with_context(|| format!("failed to load dataset from {}", dataset_path))?;
    println!(
        "loaded {} keyframes, {} landmarks, {} IMU samples",
        dataset.num_keyframes(),
        dataset.landmarks.len(),
        dataset.imu.len()
    );

    let mut pipeline = SimulationPipeline::new(
        &dataset,
        frontend,
        NoiseParams::default(),
        sim,
        DeadReckoningEstimator::new(),
        PassthroughSelector,
    )?;
    let summary = pipeline.run()?;

    let n = summary.keyframes.len();
    println!("processed {} keyframes", n);
    if let Some(last) = summary.keyframes.last() {
        println!(
            "final pose error: {:.4} rad / {:.4} m",
            last.rotation_error_rad, last.translation_error_m
        );
    }
    let mean_tracked: f64 =
        summary.keyframes.iter().map(|k| k.n_tracked as f64).sum::<f64>() / n.max(1) as f64;
    println!("mean tracked features per keyframe: {:.1}", mean_tracked);

    Ok(())
}
