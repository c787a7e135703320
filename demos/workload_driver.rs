//! External workload driver: exercises a [`CompositeStore`]
//! with the bursty read/write pattern of a small particle-in-a-box
//! simulation, mirroring `original_source/main.py`'s `ParticleBox` driver.
//! Not part of the core; the core must behave correctly under any
//! interleaving this driver produces.

use std::collections::HashMap;

use tierkv::{CompositeStore, StoreOptions};

const BOX_SIZE: usize = 32;
const STEPS: usize = 20;

/// Deterministic stand-in for `ParticleBox.step`: on each tick a handful
/// of particles are scheduled for a read, and a handful for a write,
/// based on a simple rotating pattern rather than true randomness (this
/// driver has no dependency on a RNG crate).
fn step(tick: usize) -> (Vec<usize>, HashMap<usize, f64>) {
    let reads: Vec<usize> = (0..BOX_SIZE).filter(|i| (i + tick) % 5 == 0).collect();
    let writes: HashMap<usize, f64> = (0..BOX_SIZE)
        .filter(|i| (i + tick) % 7 == 0)
        .map(|i| (i, (tick * BOX_SIZE + i) as f64 * 0.01))
        .collect();
    (reads, writes)
}

#[tokio::main]
async fn main() -> tierkv::Result<()> {
    tierkv::init_tracing();

    let dir = std::env::temp_dir().join("tierkv-workload-driver");
    std::fs::create_dir_all(&dir).ok();
    let db_path = dir.join("particles.db");
    let _ = std::fs::remove_file(&db_path);

    let mut shelf = CompositeStore::new("particles");
    shelf
        .connect(
            db_path.clone(),
            StoreOptions {
                maxlen: 16,
                sync_fraction: 0.5,
                table_name: "particles".to_string(),
            },
        )
        .await?;

    let mut count = 0usize;
    for i in 0..BOX_SIZE {
        shelf.write(&format!("pc_{i}"), &(i as f64)).await?;
        count += 1;
    }

    for tick in 0..STEPS {
        let (reads, writes) = step(tick);

        if !reads.is_empty() {
            let keys: Vec<String> = reads.iter().map(|i| format!("pc_{i}")).collect();
            let key_refs: Vec<&str> = keys.iter().map(String::as_str).collect();
            let found: HashMap<String, Option<f64>> = shelf.read_many(&key_refs).await?;
            count += found.len();
        }

        for (i, value) in writes {
            shelf.write(&format!("pc_{i}"), &value).await?;
            count += 1;
        }
    }

    shelf.close().await?;
    std::fs::remove_file(&db_path).ok();

    println!("workload driver completed {count} operations over {STEPS} steps");
    Ok(())
}
