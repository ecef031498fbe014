//! Simulated phone: opens a session, posts a slow tilt wave and prints what a
//! polling client would see.

use clap::Parser;
use shared::{MotionValue, StartResponse, UpdateRequest, UpdateResponse};
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};

#[derive(Parser, Debug)]
#[command(author, version, about = "Phone motion simulator for the bridge server")]
struct Args {
    /// Base URL of the bridge server
    #[arg(short, long, default_value = "http://127.0.0.1:8080")]
    server: String,

    /// Samples posted per second
    #[arg(short, long, default_value = "20")]
    rate: u32,

    /// Seconds to run
    #[arg(short, long, default_value = "10")]
    duration: u64,

    /// Peak tilt of the simulated wave
    #[arg(short, long, default_value = "10.0")]
    amplitude: f64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let http = reqwest::Client::new();

    let start: StartResponse = http
        .post(format!("{}/start", args.server))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    println!("Session token: {}", start.token);

    let period = Duration::from_secs_f64(1.0 / args.rate.max(1) as f64);
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let total = args.duration * args.rate.max(1) as u64;
    for step in 0..total {
        ticker.tick().await;

        let t = step as f64 * period.as_secs_f64();
        let request = UpdateRequest {
            token: start.token.clone(),
            x: MotionValue::Number(args.amplitude * (t * 0.8).sin()),
            y: MotionValue::Number(args.amplitude * (t * 0.5).cos()),
        };

        let update: UpdateResponse = http
            .post(format!("{}/update", args.server))
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if step % args.rate.max(1) as u64 == 0 {
            let scale = http
                .get(format!("{}/simple/{}", args.server, start.token))
                .send()
                .await?
                .text()
                .await?;
            println!(
                "t={:>5.1}s filtered=({:>6.2}, {:>6.2}) scale={} throttled={}",
                t, update.x, update.y, scale, update.throttled
            );
        }
    }

    http.post(format!("{}/stop/{}", args.server, start.token))
        .send()
        .await?;
    println!("Session closed");

    Ok(())
}
