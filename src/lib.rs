//! Redraft resume review service
//!
//! Accepts a resume or LinkedIn export (plain text, PDF, DOCX or image),
//! normalizes it into a text channel plus an optional inline binary channel,
//! and forwards it with a target job description to a generative model for
//! critique, a rewritten resume and a cover letter.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod state;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use state::AppState;
