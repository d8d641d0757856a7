use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use jina_mcp::config::{find_config_file, load_config, write_default_config, Config, LogFormat};
use jina_mcp::mcp::{McpServer, READER_TOOL, SEARCH_TOOL, SERVER_NAME};
use jina_mcp::models::{RequestId, RpcResponse, ToolInvocationRequest};
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Jina MCP - Jina reader and search as MCP tools over HTTP and SSE
#[derive(Parser, Debug)]
#[command(name = "jina-mcp")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Serve the Jina reader and search APIs as MCP tools", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (can be used multiple times for more verbosity: -v, -vv)
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log output format (overrides the config file)
    #[arg(long, value_enum, global = true)]
    log_format: Option<LogFormatArg>,

    /// Show all environment variables
    #[arg(long)]
    env: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum LogFormatArg {
    /// Human-readable lines
    Text,
    /// One JSON object per line
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Text => LogFormat::Text,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP/SSE server (default)
    Serve {
        /// Interface to bind (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// List the available tools and their parameters
    Tools,

    /// Read a web page as markdown
    #[command(alias = "r")]
    Read {
        /// URL of the page
        url: String,

        /// Append a summary of all links
        #[arg(long)]
        links_summary: bool,

        /// Include page metadata
        #[arg(long)]
        metadata: bool,

        /// Highlight the main content
        #[arg(long)]
        highlight: bool,

        /// Extract content from shadow DOM
        #[arg(long)]
        shadow_dom: bool,
    },

    /// Search the web
    #[command(alias = "s")]
    Search {
        /// Search query string
        query: String,

        /// Number of results
        #[arg(long, short, default_value_t = 5)]
        limit: i64,

        /// Include image results
        #[arg(long)]
        images: bool,

        /// Include site favicons
        #[arg(long)]
        favicons: bool,

        /// Result locale, e.g. en-US
        #[arg(long)]
        locale: Option<String>,
    },

    /// Send one JSON-RPC request to a running server
    Call {
        /// Tool name or built-in method (e.g. tools/list)
        method: String,

        /// Parameters as a JSON object
        #[arg(long, default_value = "{}")]
        params: String,

        /// Base URL of the server
        #[arg(long, default_value = "http://127.0.0.1:8000")]
        server: String,
    },

    /// Write a default configuration file
    Init {
        /// Destination (default: user config directory)
        #[arg(long)]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Print all available environment variables
fn print_env_vars() {
    println!("Jina MCP - Environment Variables");
    println!();
    println!("API Keys:");
    println!("  JINA_API_KEY                        Bearer token for the Jina APIs");
    println!();
    println!("Server:");
    println!("  JINA_MCP_SERVER__HOST               Interface to bind (default: 0.0.0.0)");
    println!("  JINA_MCP_SERVER__PORT               Port to listen on (default: 8000)");
    println!("  JINA_MCP_SERVER__LOG_LEVEL          debug, info, warning, error (default: info)");
    println!("  JINA_MCP_SERVER__DEBUG              Force debug logging (default: false)");
    println!();
    println!("Upstream:");
    println!("  JINA_MCP_UPSTREAM__READER_ENDPOINT  Reader URL (default: https://r.jina.ai/)");
    println!("  JINA_MCP_UPSTREAM__SEARCH_ENDPOINT  Search URL (default: https://s.jina.ai/)");
    println!("  JINA_MCP_UPSTREAM__BASE_URL         Overrides both with {{base}}/v1/reader and {{base}}/v1/search");
    println!("  JINA_MCP_UPSTREAM__TIMEOUT_SECS     Per-call timeout (default: 60)");
    println!();
    println!("SSE:");
    println!("  JINA_MCP_SSE__IDLE_TIMEOUT_SECS     Seconds before a ping is sent (default: 30)");
    println!("  JINA_MCP_SSE__RETRY_MS              Reconnect hint sent to clients (default: 30000)");
    println!("  JINA_MCP_SSE__QUEUE_CAPACITY        Queued events per client (default: 256)");
    println!();
    println!("Other Settings:");
    println!("  JINA_MCP_LOGGING__FORMAT            text or json (default: text)");
    println!("  RUST_LOG                            Rust logging filter (overrides all of the above)");
    println!();
    println!("Example:");
    println!("  export JINA_API_KEY=\"jina_...\"");
    println!("  export JINA_MCP_SERVER__PORT=\"9000\"");
}

/// Initialize tracing. `RUST_LOG` wins, then the CLI flags, then the config.
fn init_tracing(cli: &Cli, config: &Config) {
    let level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => config.server.tracing_level().unwrap_or("info"),
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("jina_mcp={level},tower_http={level}")));

    let format = cli
        .log_format
        .map(LogFormat::from)
        .unwrap_or(config.logging.format);

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}

/// Resolves on Ctrl-C, or SIGTERM on unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Run a tool in-process against the configured upstream
async fn run_tool(config: &Config, tool: &str, params: Map<String, Value>) -> Result<Value> {
    let server = McpServer::new(config)?;
    server
        .dispatcher()
        .invoke(tool, params)
        .await
        .map_err(|e| anyhow::anyhow!("{} failed: {}", tool, e))
}

/// Insert only the flags that were switched on
fn insert_flags(params: &mut Map<String, Value>, flags: &[(&str, bool)]) {
    for (name, enabled) in flags {
        if *enabled {
            params.insert(name.to_string(), Value::Bool(true));
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Show environment variables and exit if requested
    if cli.env {
        print_env_vars();
        return Ok(());
    }

    // A broken config file must not stop `init` from replacing it
    let config_path = cli.config.clone().or_else(find_config_file);
    let config = if matches!(cli.command, Some(Commands::Init { .. })) {
        Config::default()
    } else {
        load_config(config_path.as_deref()).with_context(|| match &config_path {
            Some(path) => format!("Failed to load config from {}", path.display()),
            None => "Failed to load config from environment".to_string(),
        })?
    };

    init_tracing(&cli, &config);
    if let Some(path) = &config_path {
        tracing::info!("Using config file: {}", path.display());
    }

    match cli.command {
        None => serve(config, None, None).await?,

        Some(Commands::Serve { host, port }) => serve(config, host, port).await?,

        Some(Commands::Tools) => {
            let server = McpServer::new(&config)?;
            print_json(&json!({ "tools": server.dispatcher().registry().list() }))?;
        }

        Some(Commands::Read {
            url,
            links_summary,
            metadata,
            highlight,
            shadow_dom,
        }) => {
            let mut params = Map::new();
            params.insert("url".to_string(), Value::String(url));
            insert_flags(
                &mut params,
                &[
                    ("with_links_summary", links_summary),
                    ("with_metadata", metadata),
                    ("with_highlight", highlight),
                    ("with_shadow_dom", shadow_dom),
                ],
            );

            let result = run_tool(&config, READER_TOOL, params).await?;
            match result.get("content").and_then(Value::as_str) {
                Some(content) => println!("{}", content),
                None => print_json(&result)?,
            }
        }

        Some(Commands::Search {
            query,
            limit,
            images,
            favicons,
            locale,
        }) => {
            let mut params = Map::new();
            params.insert("q".to_string(), Value::String(query));
            params.insert("limit".to_string(), json!(limit));
            insert_flags(
                &mut params,
                &[("with_images", images), ("with_favicons", favicons)],
            );
            if let Some(locale) = locale {
                params.insert("locale".to_string(), Value::String(locale));
            }

            let result = run_tool(&config, SEARCH_TOOL, params).await?;
            print_json(&result)?;
        }

        Some(Commands::Call {
            method,
            params,
            server,
        }) => {
            let params: Value =
                serde_json::from_str(&params).context("--params must be valid JSON")?;
            let request =
                ToolInvocationRequest::new(method, Some(RequestId::from(1i64))).with_params(params);
            let endpoint = format!("{}/mcp", server.trim_end_matches('/'));

            tracing::debug!(endpoint = %endpoint, "sending request");
            let response: RpcResponse = reqwest::Client::new()
                .post(&endpoint)
                .json(&request)
                .send()
                .await
                .with_context(|| format!("Failed to reach {}", endpoint))?
                .json()
                .await
                .context("Server reply was not a JSON-RPC envelope")?;

            print_json(&response)?;
            if let Some(error) = response.rpc_error() {
                bail!("request failed with code {}: {}", error.code, error.message);
            }
        }

        Some(Commands::Init { path, force }) => {
            let path = match path {
                Some(path) => path,
                None => dirs::config_dir()
                    .context("Could not determine the user config directory")?
                    .join("jina-mcp")
                    .join("config.toml"),
            };
            write_default_config(&path, force)?;
            println!("Wrote default configuration to {}", path.display());
        }
    }

    Ok(())
}

async fn serve(mut config: Config, host: Option<String>, port: Option<u16>) -> Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    if config.api_keys.jina.is_none() {
        tracing::warn!("JINA_API_KEY is not set; upstream calls will be unauthenticated");
    }

    let server = McpServer::new(&config)?;
    let addr = config.server.bind_addr();
    tracing::info!(
        "{} v{} serving {} tools",
        SERVER_NAME,
        jina_mcp::VERSION,
        server.dispatcher().registry().len()
    );

    server.run_http(&addr, shutdown_signal()).await?;
    tracing::info!("Server stopped");
    Ok(())
}
