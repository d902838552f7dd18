mod gemini;

pub use gemini::GeminiService;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// What the edit service sent back for one invocation.
///
/// Either field may be absent: the model can refuse to produce an image, and
/// it does not always add commentary. The image payload stays base64-encoded —
/// callers that need raw bytes decode it themselves.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EditOutcome {
    /// The edited image, base64-encoded.
    pub image: Option<String>,
    /// Free-text commentary from the model.
    pub text: Option<String>,
}

/// Trait for generative image-editing services.
///
/// The library ships one implementation, [`GeminiService`]; implement this to
/// add a custom backend (tests use it for stubbing).
///
/// # Example
///
/// ```rust,no_run
/// use retouch_ai::ai::{EditService, GeminiService};
///
/// # async fn example() -> anyhow::Result<()> {
/// let service = GeminiService::new("key".into(), "gemini-2.5-flash-image-preview".into());
/// let outcome = service.edit("base64data", "image/webp", "make it rain").await?;
/// println!("got image: {}", outcome.image.is_some());
/// # Ok(())
/// # }
/// ```
#[async_trait::async_trait]
pub trait EditService: Send + Sync {
    /// The display name of this service (e.g. "Gemini").
    fn name(&self) -> &str;

    /// Apply the described edit to a base64-encoded image.
    ///
    /// * `image_base64` — the source image bytes, base64-encoded
    /// * `mime_type` — the source image's mime type (e.g. `"image/webp"`)
    /// * `prompt` — the edit, described in plain language
    async fn edit(
        &self,
        image_base64: &str,
        mime_type: &str,
        prompt: &str,
    ) -> Result<EditOutcome>;
}
