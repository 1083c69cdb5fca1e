//! CLI binary for pdf2pptx-gateway.
//!
//! A thin shim over the library crate that maps flags and environment
//! variables onto `GatewayConfig`, then either serves HTTP or converts a
//! single local file.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use pdf2pptx_gateway::{
    convert_to_file, serve, AppState, BackendKind, Backends, GatewayConfig,
};
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Serve on 0.0.0.0:5000 with LibreOffice as the default backend
  pdf2pptx serve

  # Serve on another port, CloudConvert sandbox by default
  CLOUDCONVERT_API_KEY=... pdf2pptx serve --bind 127.0.0.1:8080 \
      --default-backend cloudconvert --cloudconvert-sandbox

  # Upload a file to a running gateway
  curl -F "file=@deck.pdf" -OJ http://localhost:5000/convert/libreoffice

  # Convert one local file without HTTP
  pdf2pptx convert deck.pdf -o deck.pptx --backend convertapi

  # Which backends have credentials?
  pdf2pptx backends

BACKENDS:
  adobe          Adobe PDF Services export (needs client id + secret)
  cloudconvert   CloudConvert job/task API (needs API key)
  convertapi     ConvertAPI synchronous call (needs secret)
  libreoffice    Local headless soffice (needs LibreOffice installed)

ENVIRONMENT VARIABLES:
  ADOBE_CLIENT_ID / ADOBE_CLIENT_SECRET   Adobe PDF Services credentials
  CLOUDCONVERT_API_KEY                    CloudConvert API key
  CLOUDCONVERT_SANDBOX                    Use the CloudConvert sandbox (true/false)
  CONVERTAPI_SECRET                       ConvertAPI secret
  SOFFICE_PATH                            soffice executable (default: soffice on PATH)
  RUST_LOG                                Log filter, overrides --verbose/--quiet
"#;

/// Convert PDF documents to PowerPoint through cloud or local backends.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2pptx",
    version,
    about = "PDF to PPTX conversion gateway",
    long_about = "HTTP gateway that converts uploaded PDF documents to PowerPoint \
presentations through Adobe PDF Services, CloudConvert, ConvertAPI or a local LibreOffice.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDF2PPTX_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDF2PPTX_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP gateway until Ctrl-C.
    Serve(GatewayArgs),

    /// Convert one local PDF without the HTTP layer.
    Convert {
        /// PDF file to convert.
        input: PathBuf,

        /// Output path (default: input with a .pptx extension).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Backend to use (default: --default-backend).
        #[arg(short, long)]
        backend: Option<BackendKind>,

        #[command(flatten)]
        gateway: GatewayArgs,
    },

    /// List the backends and whether each one is configured.
    Backends(GatewayArgs),
}

/// Options shared by every subcommand; each maps onto one builder setter.
#[derive(Args, Debug)]
struct GatewayArgs {
    /// Address to listen on.
    #[arg(long, env = "PDF2PPTX_BIND", default_value = "0.0.0.0:5000")]
    bind: SocketAddr,

    /// Directory for saved uploads.
    #[arg(long, env = "PDF2PPTX_UPLOAD_DIR", default_value = "uploads")]
    upload_dir: PathBuf,

    /// Directory for converted presentations.
    #[arg(long, env = "PDF2PPTX_OUTPUT_DIR", default_value = "outputs")]
    output_dir: PathBuf,

    /// Backend used by `POST /convert`.
    #[arg(long, env = "PDF2PPTX_DEFAULT_BACKEND", default_value = "libreoffice")]
    default_backend: BackendKind,

    /// Largest accepted request body in bytes.
    #[arg(long, env = "PDF2PPTX_MAX_UPLOAD_BYTES", default_value_t = 100 * 1024 * 1024)]
    max_upload_bytes: usize,

    /// Adobe PDF Services client id.
    #[arg(long, env = "ADOBE_CLIENT_ID", hide_env_values = true)]
    adobe_client_id: Option<String>,

    /// Adobe PDF Services client secret.
    #[arg(long, env = "ADOBE_CLIENT_SECRET", hide_env_values = true)]
    adobe_client_secret: Option<String>,

    /// Adobe PDF Services base URL.
    #[arg(long, env = "ADOBE_PDF_SERVICES_URL")]
    adobe_url: Option<String>,

    /// OCR locale sent with Adobe export jobs.
    #[arg(long, env = "ADOBE_OCR_LOCALE")]
    adobe_ocr_locale: Option<String>,

    /// CloudConvert API key.
    #[arg(long, env = "CLOUDCONVERT_API_KEY", hide_env_values = true)]
    cloudconvert_api_key: Option<String>,

    /// Use the CloudConvert sandbox environment.
    #[arg(long, env = "CLOUDCONVERT_SANDBOX")]
    cloudconvert_sandbox: bool,

    /// ConvertAPI secret.
    #[arg(long, env = "CONVERTAPI_SECRET", hide_env_values = true)]
    convertapi_secret: Option<String>,

    /// ConvertAPI base URL.
    #[arg(long, env = "CONVERTAPI_URL")]
    convertapi_url: Option<String>,

    /// LibreOffice executable.
    #[arg(long, env = "SOFFICE_PATH")]
    soffice_path: Option<PathBuf>,

    /// LibreOffice wall-clock limit in seconds.
    #[arg(long, default_value_t = 300)]
    soffice_timeout: u64,

    /// Ceiling in seconds for waiting on a remote job.
    #[arg(long, default_value_t = 600)]
    job_timeout: u64,

    /// Ceiling in seconds for downloading a remote result.
    #[arg(long, default_value_t = 600)]
    download_timeout: u64,

    /// Ceiling in seconds for each other call to a cloud service.
    #[arg(long, default_value_t = 300)]
    request_timeout: u64,
}

impl GatewayArgs {
    fn into_config(self) -> Result<GatewayConfig> {
        let mut builder = GatewayConfig::builder()
            .bind(self.bind)
            .upload_dir(self.upload_dir)
            .output_dir(self.output_dir)
            .default_backend(self.default_backend)
            .max_upload_bytes(self.max_upload_bytes)
            .cloudconvert_sandbox(self.cloudconvert_sandbox)
            .soffice_timeout(Duration::from_secs(self.soffice_timeout))
            .job_timeout(Duration::from_secs(self.job_timeout))
            .download_timeout(Duration::from_secs(self.download_timeout))
            .request_timeout(Duration::from_secs(self.request_timeout));

        match (self.adobe_client_id, self.adobe_client_secret) {
            (Some(id), Some(secret)) => builder = builder.adobe_credentials(id, secret),
            (None, None) => {}
            _ => bail!("ADOBE_CLIENT_ID and ADOBE_CLIENT_SECRET must be set together"),
        }
        if let Some(url) = self.adobe_url {
            builder = builder.adobe_base_url(url);
        }
        if let Some(locale) = self.adobe_ocr_locale {
            builder = builder.adobe_ocr_locale(locale);
        }
        if let Some(key) = self.cloudconvert_api_key {
            builder = builder.cloudconvert_api_key(key);
        }
        if let Some(secret) = self.convertapi_secret {
            builder = builder.convertapi_secret(secret);
        }
        if let Some(url) = self.convertapi_url {
            builder = builder.convertapi_base_url(url);
        }
        if let Some(path) = self.soffice_path {
            builder = builder.soffice_path(path);
        }

        builder.build().context("Invalid gateway configuration")
    }
}

/// Wait for Ctrl-C (or SIGTERM on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl-C, shutting down gracefully..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down gracefully..."),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The one-shot converter shows a spinner, so library INFO logs are
    // suppressed there unless --verbose.
    let converting = matches!(cli.command, Command::Convert { .. });
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || converting {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Serve(args) => run_serve(args).await,
        Command::Convert {
            input,
            output,
            backend,
            gateway,
        } => run_convert(input, output, backend, gateway, cli.quiet).await,
        Command::Backends(args) => run_backends(args),
    }
}

async fn run_serve(args: GatewayArgs) -> Result<()> {
    let config = Arc::new(args.into_config()?);
    let backends = Backends::from_config(&config).context("Failed to initialise backends")?;
    serve(AppState::new(config, backends), shutdown_signal())
        .await
        .context("Gateway terminated with an error")
}

async fn run_convert(
    input: PathBuf,
    output: Option<PathBuf>,
    backend: Option<BackendKind>,
    args: GatewayArgs,
    quiet: bool,
) -> Result<()> {
    if !input.is_file() {
        bail!("Input file not found: {}", input.display());
    }
    let output = output.unwrap_or_else(|| default_output(&input));
    let config = Arc::new(args.into_config()?);
    let kind = backend.unwrap_or(config.default_backend);
    let backends = Backends::from_config(&config).context("Failed to initialise backends")?;

    let spinner = (!quiet).then(|| {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix("Converting");
        bar.set_message(format!("{} via {}", input.display(), kind));
        bar.enable_steady_tick(Duration::from_millis(80));
        bar
    });

    let start = Instant::now();
    let result = convert_to_file(&backends, kind, &input, &output).await;
    if let Some(bar) = &spinner {
        bar.finish_and_clear();
    }

    match result {
        Ok(()) => {
            if !quiet {
                eprintln!(
                    "{} {} {}",
                    green("✔"),
                    bold(&output.display().to_string()),
                    dim(&format!("({kind}, {:.1}s)", start.elapsed().as_secs_f64()))
                );
            }
            Ok(())
        }
        Err(e) => {
            if !quiet {
                eprintln!("{} {}", red("✘"), e);
            }
            Err(e).context(format!("Conversion of {} failed", input.display()))
        }
    }
}

fn run_backends(args: GatewayArgs) -> Result<()> {
    let config = args.into_config()?;
    for kind in BackendKind::ALL {
        let status = if config.is_configured(kind) {
            green("configured")
        } else {
            red("missing credentials")
        };
        let marker = if kind == config.default_backend {
            bold(" (default)")
        } else {
            String::new()
        };
        println!("{:<14} {}{}", kind.as_str(), status, marker);
    }
    Ok(())
}

fn default_output(input: &Path) -> PathBuf {
    input.with_extension("pptx")
}
