//! Small HTTP/WebSocket load client: ramps up N simulated painters against
//! a running `canvas-server`, analogous to the teacher's QUIC load client
//! (`client/`) but speaking the paint/subscribe HTTP surface instead of a
//! raw datagram protocol.

mod metrics;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use futures_util::StreamExt;
use rand::Rng;
use serde::Serialize;
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::Message as WsMessage;

#[derive(Parser, Debug, Clone)]
struct Args {
    /// Base URL of the target server, e.g. http://127.0.0.1:8080
    #[arg(long)]
    target: String,
    #[arg(long)]
    clients: usize,
    #[arg(long)]
    id: String,
    #[arg(long, default_value_t = 10_000)]
    max_conn_jitter_ms: u64,
    #[arg(long, default_value_t = 1_000)]
    min_paint_wait_ms: u64,
    #[arg(long, default_value_t = 10_000)]
    max_paint_wait_ms: u64,
    #[arg(long, default_value_t = 0)]
    chunk_cx: i64,
    #[arg(long, default_value_t = 0)]
    chunk_cy: i64,
    /// Also open a /sub websocket to count inbound deltas.
    #[arg(long, default_value_t = true)]
    subscribe: bool,
    #[arg(long, default_value = "./metrics")]
    metrics_dir: String,
}

#[derive(Serialize)]
struct PaintBody {
    lat: f64,
    lon: f64,
    cx: i64,
    cy: i64,
    o: u32,
    color: u8,
    #[serde(rename = "turnstileToken")]
    turnstile_token: Option<String>,
}

fn jittered_wait(min_ms: u64, max_ms: u64) -> u64 {
    if min_ms >= max_ms {
        min_ms
    } else {
        rand::thread_rng().gen_range(min_ms..max_ms)
    }
}

async fn run_subscriber(target: String, cx: i64, cy: i64, metrics: Arc<metrics::LoadMetrics>) {
    let ws_url = format!("{}/sub?cx={}&cy={}", target.replacen("http", "ws", 1), cx, cy);
    let Ok((mut stream, _)) = tokio_tungstenite::connect_async(&ws_url).await else {
        metrics.failed.add(1);
        return;
    };

    while let Some(msg) = stream.next().await {
        match msg {
            Ok(WsMessage::Text(text)) => {
                metrics.rx_deltas.add(1);
                metrics.rx_bytes.add(text.len());
            }
            Ok(WsMessage::Close(_)) | Err(_) => break,
            _ => {}
        }
    }
}

async fn simulate_painter(client: reqwest::Client, metrics: Arc<metrics::LoadMetrics>, args: Args) {
    let paint_url = format!("{}/paint", args.target);
    metrics.active.add(1);

    if args.subscribe {
        let sub_target = args.target.clone();
        let sub_metrics = metrics.clone();
        let cx = args.chunk_cx;
        let cy = args.chunk_cy;
        tokio::spawn(async move {
            run_subscriber(sub_target, cx, cy, sub_metrics).await;
        });
    }

    loop {
        let wait = jittered_wait(args.min_paint_wait_ms, args.max_paint_wait_ms);
        sleep(Duration::from_millis(wait)).await;

        let body = PaintBody {
            lat: 42.3551,
            lon: -71.0657,
            cx: args.chunk_cx,
            cy: args.chunk_cy,
            o: rand::thread_rng().gen_range(0..65_536),
            color: rand::thread_rng().gen_range(0..16),
            turnstile_token: None,
        };

        match client.post(&paint_url).json(&body).send().await {
            Ok(resp) if resp.status().is_success() => {
                metrics.tx_paints.add(1);
            }
            Ok(_) => {
                // Rejections (cooldown, geofence, ...) are expected under load; not a hard failure.
            }
            Err(_) => {
                metrics.failed.add(1);
            }
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let client = reqwest::Client::new();

    let metrics = metrics::LoadMetrics::new(args.id.clone());
    metrics::spawn_csv_exporter(metrics.clone(), args.id.clone(), args.metrics_dir.clone());

    println!("starting worker {} ramping up {} painters against {}", args.id, args.clients, args.target);

    for _ in 0..args.clients {
        let client = client.clone();
        let m = metrics.clone();
        let a = args.clone();
        tokio::spawn(async move {
            let jitter = if a.max_conn_jitter_ms == 0 {
                0
            } else {
                rand::thread_rng().gen_range(0..a.max_conn_jitter_ms)
            };
            if jitter > 0 {
                sleep(Duration::from_millis(jitter)).await;
            }
            simulate_painter(client, m, a).await;
        });
    }

    std::future::pending::<()>().await;
}
