//! pdf-ws - HTTP gateway that assembles digitized page images into PDFs.

mod helpers;
mod routes;
mod state;
mod templates;

use anyhow::{Context, Result};
use clap::Parser;
use pdf_ws_core::AppConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use state::AppState;

#[derive(Parser, Debug)]
#[command(name = "pdf-ws")]
#[command(author, version, about = "PDF generation gateway", long_about = None)]
struct Args {
    /// Config file path
    #[arg(short, long, env = "PDFWS_CONFIG")]
    config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long, env = "PDFWS_HOST")]
    host: Option<String>,

    /// Port to bind to
    #[arg(short, long, env = "PDFWS_PORT")]
    port: Option<u16>,

    /// Storage root for job workspaces
    #[arg(long, env = "PDFWS_STORAGE_ROOT")]
    storage_root: Option<PathBuf>,

    /// Catalog API base URL
    #[arg(long, env = "PDFWS_CATALOG_API")]
    catalog_api: Option<String>,

    /// Search index URL template with a {PID} placeholder (enables cover pages)
    #[arg(long, env = "PDFWS_SOLR_URL_TEMPLATE")]
    solr_url_template: Option<String>,

    /// Public record URL template with an {ID} placeholder
    #[arg(long, env = "PDFWS_CATALOG_URL_TEMPLATE")]
    catalog_url_template: Option<String>,

    /// Image server URL template with a {PID} placeholder
    #[arg(long, env = "PDFWS_IIIF_URL_TEMPLATE")]
    iiif_url_template: Option<String>,

    /// Converter script
    #[arg(long, env = "PDFWS_CONVERTER")]
    converter: Option<PathBuf>,

    /// Logo image for cover pages
    #[arg(long, env = "PDFWS_LOGO")]
    logo: Option<PathBuf>,

    /// Converter chunk size hint
    #[arg(long, env = "PDFWS_CHUNK_SIZE")]
    chunk_size: Option<u32>,

    /// Outbound HTTP timeout in seconds
    #[arg(long, env = "PDFWS_HTTP_TIMEOUT")]
    http_timeout: Option<u64>,

    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    /// Layer command line and environment values over the file config.
    fn apply(self, config: &mut AppConfig) {
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(root) = self.storage_root {
            config.storage.root = Some(root);
        }
        if let Some(api) = self.catalog_api {
            config.catalog.api_host = Some(api);
        }
        if let Some(template) = self.solr_url_template {
            config.cover.solr_url_template = Some(template);
        }
        if let Some(template) = self.catalog_url_template {
            config.cover.catalog_url_template = template;
        }
        if let Some(template) = self.iiif_url_template {
            config.images.url_template = Some(template);
        }
        if let Some(script) = self.converter {
            config.converter.script = Some(script);
        }
        if let Some(logo) = self.logo {
            config.cover.logo = Some(logo);
        }
        if let Some(chunk_size) = self.chunk_size {
            config.converter.chunk_size = chunk_size;
        }
        if let Some(timeout) = self.http_timeout {
            config.http.timeout_secs = timeout;
        }
    }
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
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
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (before parsing args so env vars are available)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let default_level = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{default_level},hyper=warn,reqwest=warn")));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    let mut config = if let Some(path) = &args.config {
        AppConfig::from_file(path).context("Failed to load config file")?
    } else {
        AppConfig::load()
    };
    args.apply(&mut config);
    config.log_summary();

    let controller = pdf_ws_core::build_controller(&config)
        .context("Failed to initialize job controller")?;

    let state = Arc::new(AppState::new(controller, config.storage.root()));
    let app = routes::router(Arc::clone(&state));

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let grace = Duration::from_secs(config.server.shutdown_grace_secs);
    if state.controller.shutdown(grace).await {
        info!("All background jobs finished");
    } else {
        warn!(
            "{} background task(s) still running after {}s; abandoning them",
            state.controller.pending(),
            grace.as_secs()
        );
    }

    Ok(())
}
