//! Cache-line-aligned counters and a per-second CSV exporter, ported from
//! the teacher's `client/src/metrics.rs` QUIC load client and adapted from
//! datagrams to paint requests / subscription deltas.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::time::{sleep, Duration};

#[repr(align(64))]
pub struct AlignedAtomic(AtomicUsize);

impl AlignedAtomic {
    pub const fn new(val: usize) -> Self {
        Self(AtomicUsize::new(val))
    }

    #[inline(always)]
    pub fn add(&self, val: usize) {
        self.0.fetch_add(val, Ordering::Relaxed);
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }
}

pub struct LoadMetrics {
    pub id: String,
    pub active: AlignedAtomic,
    pub failed: AlignedAtomic,
    pub tx_paints: AlignedAtomic,
    pub rx_deltas: AlignedAtomic,
    pub rx_bytes: AlignedAtomic,
}

impl LoadMetrics {
    pub fn new(id: String) -> Arc<Self> {
        Arc::new(Self {
            id,
            active: AlignedAtomic::new(0),
            failed: AlignedAtomic::new(0),
            tx_paints: AlignedAtomic::new(0),
            rx_deltas: AlignedAtomic::new(0),
            rx_bytes: AlignedAtomic::new(0),
        })
    }
}

pub fn spawn_csv_exporter(metrics: Arc<LoadMetrics>, worker_id: String, metrics_dir: String) {
    tokio::spawn(async move {
        let path = format!("{}/{}_data.csv", metrics_dir, worker_id);
        let file_res = OpenOptions::new().create(true).write(true).truncate(true).open(&path).await;

        let mut file = match file_res {
            Ok(f) => Some(f),
            Err(_) => {
                let fallback = format!("{}_data.csv", worker_id);
                match OpenOptions::new().create(true).write(true).truncate(true).open(&fallback).await {
                    Ok(f) => Some(f),
                    Err(_) => {
                        eprintln!("could not open metrics file at {path} or fallback {fallback}, ignoring metrics reporting");
                        None
                    }
                }
            }
        };

        if let Some(ref mut f) = file {
            let _ = f.write_all(b"timestamp,active,failed,tx_paints,rx_deltas_s,rx_mbps\n").await;
        }

        let (mut last_deltas, mut last_bytes) = (0usize, 0usize);

        loop {
            sleep(Duration::from_secs(1)).await;
            let ts = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs();

            let current_deltas = metrics.rx_deltas.get();
            let current_bytes = metrics.rx_bytes.get();
            let dps = current_deltas - last_deltas;
            let mbps = ((current_bytes - last_bytes) as f64 * 8.0) / 1_000_000.0;

            let row = format!(
                "{},{},{},{},{},{:.3}\n",
                ts,
                metrics.active.get(),
                metrics.failed.get(),
                metrics.tx_paints.get(),
                dps,
                mbps
            );

            if let Some(ref mut f) = file {
                let _ = f.write_all(row.as_bytes()).await;
            }

            last_deltas = current_deltas;
            last_bytes = current_bytes;
        }
    });
}
