//! Request pipeline stages for one `POST /convert/{backend}` call.
//!
//! Each submodule implements exactly one step, so each can be tested without
//! an HTTP server or a real backend.
//!
//! ## Data Flow
//!
//! ```text
//! upload ──▶ workspace ──▶ backend ──▶ delivery
//! (multipart)  (uuid paths)  (convert)   (attachment)
//! ```
//!
//! 1. [`upload`]: pull the `file` part out of the multipart body and
//!    validate it before anything touches the filesystem
//! 2. [`workspace`]: allocate `<id>.pdf` / `<id>.pptx` paths under the
//!    configured directories; a drop guard removes both on every exit path
//! 3. backend: [`crate::convert::convert_file`] dispatches to the
//!    selected [`crate::backend::Converter`]
//! 4. [`delivery`]: read the presentation back and build the attachment
//!    response named after the uploaded file

pub mod delivery;
pub mod upload;
pub mod workspace;
