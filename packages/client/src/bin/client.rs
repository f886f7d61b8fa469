//! Interactive client for an SFU data channel.
//!
//! Joins a room's stream group over the binary-framed WebSocket transport,
//! sends stdin lines as frames and prints what the forwarding unit relays.
//! No reconnection: the client exits when the connection closes.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin sfu-link-client -- --room-id 1 --user-id 10 --token 1234
//! cargo run --bin sfu-link-client -- -H sfu.example.com:443 --secure -r 1 -u 10 -t 1234 -s camera
//! ```

use clap::Parser;

use sfu_link_client::{ClientConfig, JoinRequest, config::DEFAULT_HOST, run_client};
use sfu_link_shared::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "sfu-link-client")]
#[command(about = "Binary-framed WebSocket client for an SFU data channel", long_about = None)]
struct Args {
    /// Forwarding unit address (host[:port])
    #[arg(short = 'H', long, default_value = DEFAULT_HOST)]
    host: String,

    /// Connect with wss:// (requires the `tls` feature)
    #[arg(long)]
    secure: bool,

    /// Room to join
    #[arg(short = 'r', long)]
    room_id: i32,

    /// Own user id, also the broadcast route id
    #[arg(short = 'u', long)]
    user_id: i32,

    /// User token issued when joining the room
    #[arg(short = 't', long)]
    token: u32,

    /// Stream group inside the room
    #[arg(short = 's', long, default_value = "main")]
    stream: String,

    /// Room shared key
    #[arg(short = 'k', long, default_value = "")]
    shared_key: String,

    /// Print frames without interpreting the relay prefix
    #[arg(long)]
    raw: bool,

    /// Milliseconds to wait for the close acknowledgement
    #[arg(long, default_value_t = 5000)]
    close_timeout_ms: u64,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), &[env!("CARGO_PKG_NAME")], "info");

    let args = Args::parse();

    let config = ClientConfig {
        host: args.host,
        secure: args.secure,
        close_timeout_ms: args.close_timeout_ms,
        ..ClientConfig::default()
    };
    let request = JoinRequest {
        room_id: args.room_id,
        user_id: args.user_id,
        token: args.token,
        stream: args.stream,
        shared_key: args.shared_key,
    };

    if let Err(e) = run_client(config, request, args.raw).await {
        tracing::error!("Client error: {}", e);
        std::process::exit(1);
    }
}
