//! Join a channel, announce presence and print what arrives.
//!
//! Demonstrates:
//! - Building a socket from environment credentials
//! - Listening for broadcasts and presence changes
//! - Joining a channel and tracking presence
//! - Graceful close on Ctrl+C
//!
//! Environment:
//!   REALTIME_API_KEY       project API key (required)
//!   REALTIME_ACCESS_TOKEN  user access token (required)
//!   REALTIME_ENDPOINT      websocket endpoint (optional)
//!   REALTIME_CHANNEL       channel to join (default `main`)
//!
//! Usage:
//!   cargo run --example listen
//!   cargo run --example listen -- --debug

// ============================================================================
// Imports
// ============================================================================

use std::env;

use realtime_socket::{
    CloseOptions, Error, JoinOptions, LifecycleEvent, RealtimeSocket, Result,
};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Constants
// ============================================================================

const DEFAULT_CHANNEL: &str = "main";
const BROADCAST_EVENT: &str = "message-create";

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let debug = env::args().any(|a| a == "--debug");
    init_logging(debug);

    if let Err(e) = run().await {
        eprintln!("\n[ERROR] {e}");
        std::process::exit(1);
    }
}

fn init_logging(debug: bool) {
    let filter = if debug {
        "realtime_socket=trace"
    } else {
        "realtime_socket=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();
}

fn required_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::config(format!("{name} is not set")))
}

async fn run() -> Result<()> {
    println!("=== Realtime: listen ===\n");

    let api_key = required_env("REALTIME_API_KEY")?;
    let access_token = required_env("REALTIME_ACCESS_TOKEN")?;
    let channel = env::var("REALTIME_CHANNEL").unwrap_or_else(|_| DEFAULT_CHANNEL.to_string());

    // ========================================================================
    // Build Socket
    // ========================================================================

    let mut builder = RealtimeSocket::builder().api_key(api_key);
    if let Ok(endpoint) = env::var("REALTIME_ENDPOINT") {
        builder = builder.endpoint(endpoint);
    }
    let socket = builder.build()?;

    println!("[1] Socket {}", socket.uuid());
    println!("    Endpoint: {}\n", socket.options().endpoint);

    // ========================================================================
    // Listeners
    // ========================================================================

    socket.on_lifecycle(|event| match event {
        LifecycleEvent::Open => println!("    [open]"),
        LifecycleEvent::Close => println!("    [close]"),
        LifecycleEvent::Heartbeat => {}
        LifecycleEvent::Error(e) => println!("    [error] {}", e.message),
    });

    socket.on_broadcast(BROADCAST_EVENT, |event| {
        println!("    [{}] {} {}", event.channel_id, event.event, event.payload);
    });

    socket.on_presence_joined(|change| {
        println!(
            "    [{}] + {} {:?}",
            change.channel_id, change.presence_key, change.presence_ids
        );
    });

    socket.on_presence_left(|change| {
        println!(
            "    [{}] - {} {:?}",
            change.channel_id, change.presence_key, change.presence_ids
        );
    });

    // ========================================================================
    // Connect, Join, Track
    // ========================================================================

    println!("[2] Connecting...");
    socket.connect(access_token).await?;

    println!("[3] Joining {channel}...");
    let presence_key = socket.uuid().to_string();
    let reply = socket
        .join_channel(JoinOptions::new(channel.as_str()).presence_key(presence_key.as_str()))
        .await?;
    println!("    Join status: {:?}", reply.status());

    let reply = socket.track_presence(channel.as_str(), presence_key).await?;
    println!("    Track status: {:?}\n", reply.status());

    // ========================================================================
    // Wait
    // ========================================================================

    println!("Press Ctrl+C to exit...");
    tokio::signal::ctrl_c().await.ok();

    println!("\n[4] Closing...");
    socket.close(CloseOptions::default()).await?;

    println!("\n=== Done ===");
    Ok(())
}
