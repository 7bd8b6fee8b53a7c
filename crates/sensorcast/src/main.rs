// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Sensorcast node CLI
//!
//! Runs the resource server on a host, with a simulated thermometer feeding
//! temperature samples.
//!
//! # Usage
//!
//! ```bash
//! # Serve with defaults
//! sensorcast
//!
//! # Join resources to groups at startup
//! sensorcast --join leds/red=ff15::5 --join temp/value=ff15::7
//!
//! # Using configuration file
//! sensorcast --config sensorcast.toml
//! ```

use clap::{Parser, Subcommand};
use sensorcast::{
    GroupMembership, GroupTransport, Request, Server, ServerConfig, ServerOptions,
    ServerStatsSnapshot, UdpGroupTransport,
};
use std::io;
use std::net::Ipv6Addr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// Sensorcast sensor node
#[derive(Parser, Debug)]
#[command(name = "sensorcast")]
#[command(about = "Sensorcast - oBIX sensor node with multicast group communication")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// UDP port for group traffic
    #[arg(short, long)]
    port: Option<u16>,

    /// IPv6 interface index for multicast
    #[arg(short, long)]
    interface: Option<u32>,

    /// Startup group membership (format: "resource=address", can repeat)
    #[arg(short, long)]
    join: Vec<String>,

    /// Statistics reporting interval (seconds, 0 to disable)
    #[arg(long)]
    stats_interval: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate example configuration file
    GenConfig {
        /// Output file path
        #[arg(short, long, default_value = "sensorcast.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file
    Validate {
        /// Configuration file path
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if let Some(cmd) = args.command {
        init_logging(args.log_level.as_deref().unwrap_or("info"));
        return match cmd {
            Commands::GenConfig { output } => cmd_gen_config(output),
            Commands::Validate { config } => cmd_validate(config),
        };
    }

    // CLI level overrides the config file's
    let config = build_config(&args)?;
    init_logging(&config.log_level);

    let transport = UdpGroupTransport::new(config.bind_port, config.interface)?;
    let mut server = Server::new(transport, ServerOptions::from(&config));

    println!("Sensorcast node v{}", env!("CARGO_PKG_VERSION"));
    println!("=====================================");
    println!("Node: {} (port {})", config.name, config.bind_port);

    for membership in &config.groups {
        let request = Request::post(
            format!("{}/joinGroup", membership.resource),
            membership.address.as_bytes(),
        );
        let response = server.handle_request(&request);
        println!(
            "Group: {} -> {} ({})",
            membership.resource, membership.address, response.status
        );
    }
    println!();
    println!("Press Ctrl+C to stop...");

    let running = Arc::new(AtomicBool::new(true));
    let flag = running.clone();
    ctrlc::set_handler(move || flag.store(false, Ordering::SeqCst))?;

    let mut thermometer = SimulatedThermometer::new();
    let stats_interval = Duration::from_secs(config.stats_interval_secs);
    let mut last_sample: Option<Instant> = None;
    let mut last_stats = Instant::now();
    let mut buf = [0u8; 1500];

    while running.load(Ordering::SeqCst) {
        drain_inbound(&mut server, &mut buf, UdpGroupTransport::poll_inbound);

        if last_sample.map_or(true, |t| t.elapsed() >= config.temperature_period()) {
            server.on_temperature_sample(thermometer.next_raw());
            last_sample = Some(Instant::now());
        }

        if !stats_interval.is_zero() && last_stats.elapsed() >= stats_interval {
            print_stats(&server.stats());
            last_stats = Instant::now();
        }

        std::thread::sleep(config.poll_interval());
    }

    println!("\nShutting down...");
    println!("\nFinal Statistics:");
    print_stats(&server.stats());
    let registry = server.registry_stats();
    println!(
        "  evictions: {} handlers, {} groups",
        registry.handler_evictions, registry.group_evictions
    );
    Ok(())
}

fn init_logging(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(level))
        .with_target(false)
        .init();
}

fn log_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Dispatch every pending inbound datagram. A receive error ends this round
/// and is logged; the next round polls again. Returns datagrams handled.
fn drain_inbound<T, F>(server: &mut Server<T>, buf: &mut [u8], mut poll: F) -> usize
where
    T: GroupTransport,
    F: FnMut(&mut T, &mut [u8]) -> io::Result<Option<(Ipv6Addr, usize)>>,
{
    let mut handled = 0;
    loop {
        match poll(server.transport_mut(), &mut *buf) {
            Ok(Some((group, len))) => {
                server.handle_group_datagram(&group, &buf[..len]);
                handled += 1;
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("receive failed: {}", e);
                break;
            }
        }
    }
    handled
}

fn build_config(args: &Args) -> Result<ServerConfig, sensorcast::ConfigError> {
    let mut config = match args.config {
        Some(ref path) => ServerConfig::from_file(path)?,
        None => ServerConfig::default(),
    };

    if let Some(port) = args.port {
        config.bind_port = port;
    }
    if let Some(interface) = args.interface {
        config.interface = interface;
    }
    if let Some(secs) = args.stats_interval {
        config.stats_interval_secs = secs;
    }
    if let Some(ref level) = args.log_level {
        config.log_level = level.clone();
    }
    for arg in &args.join {
        config.add_group(GroupMembership::parse(arg)?);
    }

    config.validate()?;
    Ok(config)
}

fn cmd_gen_config(output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = ServerConfig {
        name: "example-node".into(),
        ..Default::default()
    };
    config.add_group(GroupMembership::new("leds/red", "ff15::5"));
    config.add_group(GroupMembership::new("temp/value", "ff15::7"));

    let toml_str = toml::to_string_pretty(&config)?;

    let content = format!(
        r#"# Sensorcast Configuration
# Generated by sensorcast gen-config

{}
"#,
        toml_str
    );

    std::fs::write(&output, content)?;
    println!("Generated configuration file: {}", output.display());
    Ok(())
}

fn cmd_validate(config_path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    match ServerConfig::from_file(&config_path) {
        Ok(config) => {
            println!("Configuration valid!");
            println!();
            println!("Node: {}", config.name);
            println!(
                "Blocks: {} bytes max, {} bytes per message",
                config.max_chunk_size, config.chunks_total
            );
            println!("Groups: {}", config.groups.len());
            for (i, group) in config.groups.iter().enumerate() {
                println!("  [{}] {} -> {}", i, group.resource, group.address);
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("Configuration invalid: {}", e);
            std::process::exit(1);
        }
    }
}

fn print_stats(stats: &ServerStatsSnapshot) {
    println!("--- Node Statistics ({}s up) ---", stats.uptime.as_secs());
    println!(
        "  requests: {}, chunks: {} ({}), out of scope: {}, render failures: {}, errors: {}",
        stats.requests,
        stats.chunks_served,
        format_bytes(stats.bytes_served),
        stats.range_rejections,
        stats.render_failures,
        stats.request_errors
    );
    println!(
        "  group updates: {} sent, {} failed; inbound: {} dispatched, {} dropped",
        stats.updates_sent,
        stats.send_failures,
        stats.datagrams_dispatched,
        stats.datagrams_dropped
    );
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

/// Stand-in for the TMP102: drifts slowly between 20 and 24 C in raw units.
struct SimulatedThermometer {
    raw: i16,
    step: i16,
}

impl SimulatedThermometer {
    const LOW: i16 = 20 << 8;
    const HIGH: i16 = 24 << 8;

    fn new() -> Self {
        Self {
            raw: 21 << 8,
            step: 0x40,
        }
    }

    fn next_raw(&mut self) -> i16 {
        if self.raw + self.step > Self::HIGH || self.raw + self.step < Self::LOW {
            self.step = -self.step;
        }
        self.raw += self.step;
        self.raw
    }
}
