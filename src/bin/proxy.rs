//! resptap Proxy Binary
//!
//! Starts the relay in front of a RESP server.

use std::sync::Arc;

use clap::Parser;
use resptap::network::Server;
use resptap::observer::build_registry;
use resptap::{Config, PublishMode, PublisherConfig};
use tracing_subscriber::{fmt, EnvFilter};

/// resptap relay
#[derive(Parser, Debug)]
#[command(name = "resptap-proxy")]
#[command(about = "Transparent RESP relay that reports every command")]
#[command(version)]
struct Args {
    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:6400")]
    listen: String,

    /// Backend server address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:6379")]
    backend: String,

    /// Don't log each command
    #[arg(short, long)]
    quiet: bool,

    /// Leave Nagle's algorithm on for both legs
    #[arg(long)]
    no_nodelay: bool,

    /// Socket read timeout in milliseconds (0 = none)
    #[arg(long, default_value = "0")]
    read_timeout_ms: u64,

    /// Socket write timeout in milliseconds (0 = none)
    #[arg(long, default_value = "0")]
    write_timeout_ms: u64,

    /// Deepest reply nesting accepted from the backend
    #[arg(long, default_value_t = resptap::config::DEFAULT_MAX_DEPTH)]
    max_depth: usize,

    /// Publish completed commands to the store at this address
    #[arg(long)]
    publish_addr: Option<String>,

    /// Password for the publish store
    #[arg(long)]
    publish_password: Option<String>,

    /// Database on the publish store
    #[arg(long, default_value = "0")]
    publish_db: u32,

    /// Channel to PUBLISH records to
    #[arg(long, default_value = "redis:commands")]
    channel: String,

    /// LPUSH records onto a list instead of publishing
    #[arg(long)]
    use_list: bool,

    /// List key used with --use-list
    #[arg(long, default_value = "redis:command_list")]
    list_key: String,

    /// Records kept in the list (0 = unbounded)
    #[arg(long, default_value = "0")]
    max_list_len: u64,
}

impl Args {
    fn into_config(self) -> Config {
        let mut builder = Config::builder()
            .listen_addr(self.listen)
            .backend_addr(self.backend)
            .log_commands(!self.quiet)
            .nodelay(!self.no_nodelay)
            .read_timeout_ms(self.read_timeout_ms)
            .write_timeout_ms(self.write_timeout_ms)
            .max_depth(self.max_depth);

        if let Some(addr) = self.publish_addr {
            builder = builder.publisher(PublisherConfig {
                addr,
                password: self.publish_password,
                db: self.publish_db,
                channel: self.channel,
                list_key: self.list_key,
                max_list_len: self.max_list_len,
                mode: if self.use_list {
                    PublishMode::List
                } else {
                    PublishMode::Channel
                },
            });
        }

        builder.build()
    }
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,resptap=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let config = Args::parse().into_config();

    tracing::info!("resptap v{}", resptap::VERSION);
    tracing::info!("Listen address: {}", config.listen_addr);
    tracing::info!("Backend address: {}", config.backend_addr);

    if let Err(e) = config.validate() {
        tracing::error!("{}", e);
        std::process::exit(1);
    }

    // Observer composition is fixed from here on
    let registry = Arc::new(build_registry(&config));

    let server = match Server::bind(config, Arc::clone(&registry)) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to bind listener: {}", e);
            registry.close();
            std::process::exit(1);
        }
    };

    let handle = server.shutdown_handle();
    if let Err(e) = ctrlc::set_handler(move || {
        tracing::info!("Received Ctrl+C, initiating shutdown...");
        handle.shutdown();
    }) {
        tracing::warn!("Ctrl+C handler not installed: {}", e);
    }

    match server.run() {
        Ok(report) => tracing::info!(
            "Server stopped ({} observers closed, {} failed)",
            report.closed,
            report.failures.len()
        ),
        Err(e) => {
            tracing::error!("Server error: {}", e);
            std::process::exit(1);
        }
    }
}
