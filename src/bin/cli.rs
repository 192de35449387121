//! commlink CLI Client
//!
//! Command-line tool for talking to a commlink server or UDP endpoint.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use commlink::{
    CallbackResult, CommClient, Config, DatagramCallback, DatagramReceiver, DatagramSender, FnHandler, Reactor,
    Terminator,
};
use crossbeam::channel;
use tracing_subscriber::{fmt, EnvFilter};

/// commlink CLI
#[derive(Parser, Debug)]
#[command(name = "commlink-cli")]
#[command(about = "CLI for commlink servers and UDP endpoints")]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Send framed messages over TCP and print the replies
    Send {
        /// Server address
        #[arg(short, long, default_value = "127.0.0.1:7070")]
        server: SocketAddr,

        /// Message terminator (escape sequences \n, \r and \t are understood)
        #[arg(short, long, default_value = "\\n")]
        terminator: String,

        /// Seconds to wait for each reply
        #[arg(short, long, default_value = "5")]
        wait: u64,

        /// Messages to send
        #[arg(required = true)]
        messages: Vec<String>,
    },

    /// Send one UDP datagram
    Datagram {
        /// Target address
        #[arg(short, long)]
        target: SocketAddr,

        /// Payload
        payload: String,
    },

    /// Print UDP datagrams arriving on an address
    Listen {
        /// Address to bind
        #[arg(short, long, default_value = "127.0.0.1:7071")]
        bind: SocketAddr,

        /// Stop after this many datagrams (0 = forever)
        #[arg(short, long, default_value = "0")]
        count: usize,
    },
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_target(true).init();

    let args = Args::parse();
    let config = Config::default();

    let (reactor, join) = match Reactor::start(&config) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Failed to start reactor: {}", e);
            std::process::exit(1);
        }
    };

    let code = match run(args.command, &reactor, &config) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    };

    reactor.shutdown();
    let code = match join.join() {
        Ok(Ok(())) => code,
        Ok(Err(e)) => {
            tracing::error!("Reactor error: {}", e);
            1
        }
        Err(_) => {
            tracing::error!("Reactor thread panicked");
            1
        }
    };
    std::process::exit(code);
}

fn run(command: Commands, reactor: &commlink::ReactorHandle, config: &Config) -> commlink::Result<()> {
    match command {
        Commands::Send {
            server,
            terminator,
            wait,
            messages,
        } => {
            let (tx, rx) = channel::unbounded();
            let handler = FnHandler::new().on_message(move |_channel, message| {
                tx.send(message)?;
                Ok(())
            });

            let client = CommClient::connect(
                reactor,
                server,
                Terminator::from_escaped(&terminator)?,
                "cli",
                Arc::new(handler),
                config,
            )?;
            tracing::info!("connected to {}", client.addr());

            for message in &messages {
                client.send_str(message)?;
                match rx.recv_timeout(Duration::from_secs(wait)) {
                    Ok(reply) => println!("{}", String::from_utf8_lossy(&reply)),
                    Err(_) => println!("(no reply)"),
                }
            }
            client.stop();
            Ok(())
        }

        Commands::Datagram { target, payload } => {
            let sender = DatagramSender::open(reactor, target)?;
            sender.send_data(payload.into_bytes())?;
            // Give the reactor a moment to flush the slot.
            for _ in 0..50 {
                if !sender.has_pending() {
                    break;
                }
                std::thread::sleep(Duration::from_millis(10));
            }
            Ok(())
        }

        Commands::Listen { bind, count } => {
            let (tx, rx) = channel::unbounded();
            let callback: DatagramCallback = Arc::new(
                move |payload: &[u8], from: SocketAddr| -> CallbackResult {
                    tx.send((payload.to_vec(), from))?;
                    Ok(())
                },
            );
            let receiver = DatagramReceiver::bind(reactor, bind, Some(callback), config)?;
            println!("listening on {}", receiver.local_addr());

            let mut seen = 0;
            while let Ok((payload, from)) = rx.recv() {
                println!("{}: {}", from, String::from_utf8_lossy(&payload));
                seen += 1;
                if count > 0 && seen >= count {
                    break;
                }
            }
            Ok(())
        }
    }
}
