//! # pdf2pptx-gateway
//!
//! An HTTP gateway that turns an uploaded PDF into a PowerPoint (`.pptx`)
//! presentation through one of four interchangeable conversion backends.
//!
//! ## Request Overview
//!
//! ```text
//! POST /convert/{backend}  (multipart field "file")
//!  │
//!  ├─ 1. Upload     validate filename and content, nothing on disk yet
//!  ├─ 2. Workspace  save as uploads/<uuid>.pdf, reserve outputs/<uuid>.pptx
//!  ├─ 3. Backend    adobe | cloudconvert | convertapi | libreoffice
//!  ├─ 4. Delivery   200 attachment named <original stem>.pptx
//!  └─ 5. Cleanup    both files removed on every exit path
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2pptx_gateway::{serve, AppState, Backends, GatewayConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Arc::new(GatewayConfig::builder().build()?);
//!     let backends = Backends::from_config(&config)?;
//!     let shutdown = async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     };
//!     serve(AppState::new(config, backends), shutdown).await?;
//!     Ok(())
//! }
//! ```
//!
//! Converting without the HTTP layer:
//!
//! ```rust,no_run
//! use pdf2pptx_gateway::{convert_bytes, BackendKind, Backends, GatewayConfig};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Arc::new(GatewayConfig::builder().build()?);
//! let backends = Backends::from_config(&config)?;
//! let pdf = std::fs::read("slides.pdf")?;
//! let pptx = convert_bytes(&backends, BackendKind::LibreOffice, &pdf).await?;
//! std::fs::write("slides.pptx", pptx)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2pptx` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when embedding the gateway as a library:
//! ```toml
//! pdf2pptx-gateway = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod backend;
pub mod config;
pub mod convert;
pub mod error;
pub mod pipeline;
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use backend::{BackendKind, Backends, Converter, UnknownBackend};
pub use config::{GatewayConfig, GatewayConfigBuilder};
pub use convert::{convert_bytes, convert_file, convert_to_file};
pub use error::{ConversionFailure, FailureKind, GatewayError};
pub use server::{build_router, serve, AppState};
