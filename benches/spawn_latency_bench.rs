// Spawn latency benchmark
// Measures launch-to-reap latency of a trivial child for each backend,
// with std::process::Command as the baseline.

use pspawn::{fspawn, pspawn, wait, SpawnRequest, StdStream};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

const ITERATIONS: usize = 500;
const WARMUP_ITERATIONS: usize = 20;

/// Latency percentiles
struct LatencyStats {
    p50: Duration,
    p95: Duration,
    p99: Duration,
    min: Duration,
    max: Duration,
    mean: Duration,
}

impl LatencyStats {
    fn from_samples(mut samples: Vec<Duration>) -> Self {
        samples.sort();
        let len = samples.len();

        let p50_idx = (len as f64 * 0.50) as usize;
        let p95_idx = (len as f64 * 0.95) as usize;
        let p99_idx = (len as f64 * 0.99) as usize;

        let sum: Duration = samples.iter().sum();
        let mean = sum / len as u32;

        Self {
            p50: samples[p50_idx],
            p95: samples[p95_idx],
            p99: samples[p99_idx],
            min: samples[0],
            max: samples[len - 1],
            mean,
        }
    }

    fn print(&self, label: &str) {
        println!("\n=== {} ===", label);
        println!("  p50: {:?}", self.p50);
        println!("  p95: {:?}", self.p95);
        println!("  p99: {:?}", self.p99);
        println!("  min: {:?}", self.min);
        println!("  max: {:?}", self.max);
        println!("  mean: {:?}", self.mean);
    }
}

fn measure<F: FnMut()>(mut launch: F) -> LatencyStats {
    for _ in 0..WARMUP_ITERATIONS {
        launch();
    }

    let samples = (0..ITERATIONS)
        .map(|_| {
            let start = Instant::now();
            launch();
            start.elapsed()
        })
        .collect();

    LatencyStats::from_samples(samples)
}

fn main() {
    println!("=== pspawn launch latency ===");
    println!("Iterations: {} (after {} warmup)", ITERATIONS, WARMUP_ITERATIONS);

    let request = SpawnRequest::new("true").redirect_to_file(StdStream::Out, "/dev/null");

    measure(|| {
        let pid = fspawn(&request).unwrap();
        wait(pid).unwrap();
    })
    .print("fork + exec");

    measure(|| {
        let pid = pspawn(&request).unwrap();
        wait(pid).unwrap();
    })
    .print("posix_spawn");

    measure(|| {
        Command::new("true").stdout(Stdio::null()).status().unwrap();
    })
    .print("std::process::Command");
}
