//! commlink Server Binary
//!
//! Line echo server: every framed message is sent back to its channel.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use commlink::{CommServer, Config, FnHandler, LinkEvent, Reactor, Terminator};
use tracing_subscriber::{fmt, EnvFilter};

/// commlink echo server
#[derive(Parser, Debug)]
#[command(name = "commlink-server")]
#[command(about = "Terminator-framed TCP echo server")]
#[command(version)]
struct Args {
    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:7070")]
    listen: SocketAddr,

    /// Maximum simultaneous connections
    #[arg(short, long, default_value = "10")]
    max_connections: usize,

    /// Message terminator (escape sequences \n, \r and \t are understood)
    #[arg(short, long, default_value = "\\n")]
    terminator: String,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,commlink=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("commlink server v{}", commlink::VERSION);
    tracing::info!("Listen address: {}", args.listen);

    let config = Config::builder()
        .max_connections(args.max_connections)
        .build();

    let terminator = match Terminator::from_escaped(&args.terminator) {
        Ok(t) => t,
        Err(e) => {
            tracing::error!("Invalid terminator: {}", e);
            std::process::exit(1);
        }
    };

    let (reactor, join) = match Reactor::start(&config) {
        Ok(r) => r,
        Err(e) => {
            tracing::error!("Failed to start reactor: {}", e);
            std::process::exit(1);
        }
    };

    let handler = FnHandler::new()
        .on_event(|channel, event| {
            match event {
                LinkEvent::Connected => tracing::info!("{} connected", channel),
                LinkEvent::Disconnected => tracing::info!("{} disconnected", channel),
            }
            Ok(())
        })
        .on_message(|channel, message| {
            channel.send(&message, true)?;
            Ok(())
        });

    let server = match CommServer::bind(&reactor, args.listen, terminator, Arc::new(handler), &config) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", args.listen, e);
            std::process::exit(1);
        }
    };

    // Blocks until the reactor shuts down or hits a fatal poll error.
    let result = join.join();
    server.stop();
    reactor.shutdown();

    match result {
        Ok(Ok(())) => tracing::info!("Server stopped"),
        Ok(Err(e)) => {
            tracing::error!("Reactor error: {}", e);
            std::process::exit(1);
        }
        Err(_) => {
            tracing::error!("Reactor thread panicked");
            std::process::exit(1);
        }
    }
}
