//! eTabeb MCP Server - Main binary

use anyhow::Result;
use clap::Parser;
use etabeb_mcp::transport::{HttpTransport, StdioTransport, Transport};
use etabeb_mcp::{McpServer, ServerConfig};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "etabeb-mcp")]
#[command(about = "eTabeb Model Context Protocol Server")]
#[command(version)]
struct Cli {
    /// Host to bind to for HTTP transport
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port to bind to for HTTP transport
    #[arg(long, default_value = "3000")]
    port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Transport mode: stdio, http, or both
    #[arg(long, default_value = "http", value_parser = ["stdio", "http", "both"])]
    transport: String,

    /// Base URL of the eTabeb booking API (overrides ETABEB_API_BASE_URL)
    #[arg(long)]
    upstream_base_url: Option<String>,

    /// Base URL of the booking web app linked from the widget (overrides BOOKING_APP_URL)
    #[arg(long)]
    booking_app_url: Option<String>,

    /// Upstream request timeout in seconds
    #[arg(long, default_value = "15")]
    upstream_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr for stdio transport so stdout stays a clean protocol channel
    if cli.transport == "stdio" {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false)
                    .with_writer(std::io::stderr),
            )
            .with(tracing_subscriber::EnvFilter::new(&cli.log_level))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .with(tracing_subscriber::EnvFilter::new(&cli.log_level))
            .init();
    }

    info!("Starting eTabeb MCP Server v{}", etabeb_mcp::VERSION);

    let mut config = ServerConfig::from_env();
    config.host = cli.host.clone();
    config.port = cli.port;
    config.log_level = cli.log_level;
    config.http_transport = cli.transport == "http" || cli.transport == "both";
    config.stdio_transport = cli.transport == "stdio" || cli.transport == "both";
    config.upstream_timeout_secs = cli.upstream_timeout;
    if let Some(url) = cli.upstream_base_url {
        config.upstream_base_url = url;
    }
    if let Some(url) = cli.booking_app_url {
        config.booking_app_url = url;
    }

    let server = McpServer::from_config(config)?;

    let shutdown_signal = async {
        match signal::ctrl_c().await {
            Ok(_) => info!("Received Ctrl+C, shutting down..."),
            Err(err) => error!("Unable to listen for shutdown signal: {}", err),
        }
    };

    match cli.transport.as_str() {
        "stdio" => {
            info!("Starting stdio transport for MCP client integration");
            let transport = StdioTransport::new();

            tokio::select! {
                result = transport.start(Box::new(server.clone())) => {
                    match result {
                        Ok(_) => info!("Stdio transport completed successfully"),
                        Err(e) => error!("Stdio transport error: {}", e),
                    }
                }
                _ = shutdown_signal => {
                    info!("Shutdown signal received, stopping stdio transport");
                    if let Err(e) = transport.shutdown().await {
                        error!("Error during stdio transport shutdown: {}", e);
                    }
                }
            }
        }
        "http" => {
            info!("Starting HTTP transport on {}:{}", cli.host, cli.port);
            let transport = HttpTransport::new(cli.host.clone(), cli.port);

            tokio::select! {
                result = transport.start(Box::new(server.clone())) => {
                    match result {
                        Ok(_) => info!("HTTP transport completed successfully"),
                        Err(e) => error!("HTTP transport error: {}", e),
                    }
                }
                _ = shutdown_signal => {
                    info!("Shutdown signal received, stopping HTTP transport");
                    if let Err(e) = transport.shutdown().await {
                        error!("Error during HTTP transport shutdown: {}", e);
                    }
                }
            }
        }
        "both" => {
            info!("Starting both stdio and HTTP transports");
            let stdio_transport = StdioTransport::new();
            let http_transport = HttpTransport::new(cli.host.clone(), cli.port);

            let stdio_server = server.clone();
            let stdio_task = tokio::spawn(async move {
                if let Err(e) = stdio_transport.start(Box::new(stdio_server)).await {
                    error!("Stdio transport error: {}", e);
                }
            });

            let http_task = tokio::spawn(async move {
                if let Err(e) = http_transport.start(Box::new(server)).await {
                    error!("HTTP transport error: {}", e);
                }
            });

            tokio::select! {
                _ = stdio_task => info!("Stdio transport task completed"),
                _ = http_task => info!("HTTP transport task completed"),
                _ = shutdown_signal => info!("Shutdown signal received"),
            }
        }
        _ => unreachable!("clap validates the transport value"),
    }

    info!("eTabeb MCP Server stopped");
    Ok(())
}
