//! # retouch-ai
//!
//! AI-powered image retouching — fetch or open an image, describe the edit in
//! plain language, and apply it with a generative vision model (Google
//! Gemini).
//!
//! ## Quick Start
//!
//! The whole workflow lives in the [`session`] module: load a source image
//! into a [`session::Session`], then run a generation against an edit
//! service:
//!
//! ```rust,no_run
//! use retouch_ai::ai::GeminiService;
//! use retouch_ai::config::Config;
//! use retouch_ai::session::{self, Session};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(None)?;
//!     let service = GeminiService::from_config(&config.gemini)?;
//!
//!     let mut session = Session::new();
//!     session.prompt = "Make the sky a deep sunset orange".into();
//!
//!     let client = reqwest::Client::new();
//!     session::load_source_from_url(&mut session, &client, &config.default_image_url).await;
//!     session::generate(&mut session, &service).await;
//!
//!     if let Some(ref err) = session.error {
//!         eprintln!("{err}");
//!     } else {
//!         println!("{}", session.response_text);
//!         // session.edited_image now holds a data:image/jpeg;base64,... URI
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`ai`] — edit-service trait and the Gemini implementation
//! - [`config`] — configuration types and loading/saving
//! - [`error`] — user-facing failure kinds
//! - [`inline`] — inline (base64) image representation and acquisition
//! - [`session`] — session state and the operations that mutate it

pub mod ai;
pub mod config;
pub mod error;
pub mod inline;
pub mod session;
