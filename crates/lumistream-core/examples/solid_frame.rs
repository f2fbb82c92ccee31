//! Controller Communication Test Tool
//!
//! Paints one panel a solid color to verify cabling, baud rate, and protocol
//! settings against a live controller.
//!
//! Usage:
//!   cargo run --example solid_frame -- [OPTIONS]
//!
//! Options:
//!   --port PORT       Serial port (default: first Teensy-VID port found)
//!   --baud RATE       Baud rate (default: 57600)
//!   --panel N         Panel index (default: 0)
//!   --pixels N        Pixels to paint (default: 100)
//!   --rgb R,G,B       Color (default: 255,255,255)
//!   --no-checksums    Disable frame checksums

use lumistream_core::protocol::{
    find_controller_port, frame::pack_channels, open_port, Mnemonic, SerialTransport, Session,
    SessionConfig, DEFAULT_BAUD_RATE,
};
use std::time::Duration;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();

    let mut port_name: Option<String> = None;
    let mut baud_rate = DEFAULT_BAUD_RATE;
    let mut panel = 0u32;
    let mut pixels = 100usize;
    let mut rgb = [255u8, 255, 255];
    let mut config = SessionConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--port" | "-p" => {
                i += 1;
                if i < args.len() {
                    port_name = Some(args[i].clone());
                }
            }
            "--baud" | "-b" => {
                i += 1;
                if i < args.len() {
                    baud_rate = args[i].parse().unwrap_or(DEFAULT_BAUD_RATE);
                }
            }
            "--panel" => {
                i += 1;
                if i < args.len() {
                    panel = args[i].parse().unwrap_or(0);
                }
            }
            "--pixels" => {
                i += 1;
                if i < args.len() {
                    pixels = args[i].parse().unwrap_or(100);
                }
            }
            "--rgb" => {
                i += 1;
                if i < args.len() {
                    let parts: Vec<u8> = args[i]
                        .split(',')
                        .filter_map(|v| v.parse().ok())
                        .collect();
                    if parts.len() == 3 {
                        rgb = [parts[0], parts[1], parts[2]];
                    }
                }
            }
            "--no-checksums" => {
                config.checksums = false;
            }
            other => {
                eprintln!("unknown option: {other}");
                std::process::exit(2);
            }
        }
        i += 1;
    }

    let port_name = port_name
        .or_else(|| find_controller_port().map(|p| p.name))
        .unwrap_or_else(|| {
            eprintln!("no controller found; pass --port");
            std::process::exit(1);
        });

    println!("Opening {port_name} at {baud_rate} baud");
    let port = match open_port(&port_name, baud_rate, Duration::from_millis(config.timeout_ms)) {
        Ok(port) => port,
        Err(e) => {
            eprintln!("failed to open {port_name}: {e}");
            std::process::exit(1);
        }
    };

    let result = (|| {
        let mut session = Session::new(Box::new(SerialTransport::new(port)), config)?;
        session.reset_board()?;

        let channels: Vec<i64> = (0..pixels)
            .flat_map(|_| rgb.iter().map(|&c| c as i64))
            .collect();
        let payload = pack_channels(&channels);
        session.chunk_and_submit(Mnemonic::PixelsRgb, &format!("Q{panel}"), &payload)?;
        session.submit_sync(Mnemonic::ShowFrame, "")?;
        println!(
            "Painted {pixels} pixels on panel {panel}, {} commands awaiting ack",
            session.pending()
        );
        Ok::<_, lumistream_core::protocol::ProtocolError>(())
    })();

    if let Err(e) = result {
        eprintln!("session failed: {e}");
        std::process::exit(1);
    }
}
