//! Web front end for speech enhancement.
//!
//! ## Routes
//!
//! - `GET /` - upload page
//! - `POST /enhance` - multipart upload, answered with a page holding the
//!   original and enhanced players (or a warning/error message)
//! - `POST /api/enhance` - same upload, answered with JSON carrying both
//!   WAV files base64-encoded
//! - `GET /health` - liveness check
//!
//! ## Usage
//!
//! ```ignore
//! let enhancer = SpeechEnhancer::from_config(&config)?;
//! web::start_server(&config, enhancer).await?;
//! ```
//!
//! Inference is CPU bound and runs on the blocking pool. Requests are
//! serialized on the single loaded model.

mod handlers;
mod page;
mod server;
mod types;

pub use server::{build_router, start_server, AppState};
pub use types::{EnhanceResponse, ErrorResponse, HealthResponse};
