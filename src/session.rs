//! Session state and the operations that mutate it.
//!
//! One [`Session`] holds everything the UI renders: the prompt, the source
//! image, the edited result, the loading flag, the error field, and the
//! model's commentary. All mutation goes through begin/finish pairs so that
//! every async operation is bracketed the same way: `begin_*` flips the
//! loading flag, clears the previous error, and hands out a sequence ticket;
//! `finish_*` applies the result only if the ticket is still the latest
//! issued for that operation kind. A slow fetch completing after a newer
//! upload is therefore discarded instead of overwriting fresher state.
//!
//! The free async fns at the bottom drive a whole operation while holding
//! `&mut Session`, which makes the session single-writer by construction —
//! that is what the CLI and the tests use. The GUI splits the pairs across
//! its background runtime and message channel instead.

use std::path::Path;

use crate::ai::{EditOutcome, EditService};
use crate::error::RetouchError;
use crate::inline::InlineImage;

/// Presentation mime type for edited images. Fixed: the service's actual
/// output format is not preserved.
const EDITED_MIME: &str = "image/jpeg";

const VALIDATION_MSG: &str = "enter a prompt and load a source image first";
const NO_IMAGE_MSG: &str = "the model did not return an image; it may have refused the request";
const NO_TEXT_MSG: &str = "No text response from the model.";

/// Ticket for a source-load operation (URL fetch or file read).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceTicket(u64);

/// Ticket for a generation operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerateTicket(u64);

/// The inputs captured for one generation attempt.
#[derive(Debug, Clone)]
pub struct EditRequest {
    pub ticket: GenerateTicket,
    pub image: InlineImage,
    pub prompt: String,
}

/// All state behind the edit workflow. Owned by one surface (GUI app or CLI
/// run); never persisted.
#[derive(Debug, Default)]
pub struct Session {
    /// The edit the user wants, in plain language.
    pub prompt: String,
    /// Current source image, once one has been fetched or read.
    pub source: Option<InlineImage>,
    /// The last edited result, as a displayable data URI.
    pub edited_image: Option<String>,
    /// Commentary from the model for the last generation.
    pub response_text: String,
    /// Last failure, rendered for display. Cleared when a new operation starts.
    pub error: Option<String>,
    /// True while an operation is in flight.
    pub loading: bool,

    source_seq: u64,
    generate_seq: u64,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a source-load operation (URL fetch or file read).
    #[must_use]
    pub fn begin_source_load(&mut self) -> SourceTicket {
        self.source_seq += 1;
        self.loading = true;
        self.error = None;
        SourceTicket(self.source_seq)
    }

    /// Apply the result of a source load.
    ///
    /// Returns `false` — and mutates nothing — when a newer source load has
    /// been issued since this ticket. On success the new source replaces the
    /// old one and any previously edited image is cleared.
    pub fn finish_source_load(
        &mut self,
        ticket: SourceTicket,
        result: Result<InlineImage, RetouchError>,
    ) -> bool {
        if ticket.0 != self.source_seq {
            log::debug!("discarding stale source load (seq {})", ticket.0);
            return false;
        }
        self.loading = false;
        match result {
            Ok(image) => {
                log::info!("source image ready ({}, {} chars)", image.mime_type, image.data.len());
                self.source = Some(image);
                self.edited_image = None;
            }
            Err(err) => {
                log::warn!("source load failed: {err}");
                self.error = Some(err.to_string());
            }
        }
        true
    }

    /// Start a generation attempt.
    ///
    /// Rejects with a validation error — recorded in the session's error
    /// field, without touching anything else — when the prompt is empty or no
    /// source image is loaded. Otherwise clears the previous result and
    /// returns the captured inputs for the caller to send.
    pub fn begin_generate(&mut self) -> Result<EditRequest, RetouchError> {
        let source = match self.source.clone() {
            Some(source) if !self.prompt.is_empty() => source,
            _ => {
                let err = RetouchError::Validation(VALIDATION_MSG.to_string());
                self.error = Some(err.to_string());
                return Err(err);
            }
        };

        self.generate_seq += 1;
        self.loading = true;
        self.error = None;
        self.edited_image = None;
        self.response_text.clear();

        Ok(EditRequest {
            ticket: GenerateTicket(self.generate_seq),
            image: source,
            prompt: self.prompt.clone(),
        })
    }

    /// Apply the result of a generation attempt.
    ///
    /// Returns `false` — and mutates nothing — when a newer attempt has been
    /// issued since this ticket.
    pub fn finish_generate(
        &mut self,
        ticket: GenerateTicket,
        result: anyhow::Result<EditOutcome>,
    ) -> bool {
        if ticket.0 != self.generate_seq {
            log::debug!("discarding stale generation (seq {})", ticket.0);
            return false;
        }
        self.loading = false;
        match result {
            Ok(outcome) => {
                match outcome.image {
                    Some(payload) => {
                        self.edited_image =
                            Some(format!("data:{EDITED_MIME};base64,{payload}"));
                    }
                    None => {
                        let err = RetouchError::Generation(NO_IMAGE_MSG.to_string());
                        self.error = Some(err.to_string());
                    }
                }
                self.response_text = outcome
                    .text
                    .unwrap_or_else(|| NO_TEXT_MSG.to_string());
            }
            Err(err) => {
                log::warn!("generation failed: {err}");
                let err = RetouchError::Generation(err.to_string());
                self.error = Some(err.to_string());
            }
        }
        true
    }
}

/// Fetch a source image over HTTP and store it in the session.
pub async fn load_source_from_url(session: &mut Session, client: &reqwest::Client, url: &str) {
    let ticket = session.begin_source_load();
    let result = InlineImage::fetch(client, url).await;
    session.finish_source_load(ticket, result);
}

/// Read a source image from a local file and store it in the session.
pub async fn load_source_from_path(session: &mut Session, path: &Path) {
    let ticket = session.begin_source_load();
    let result = InlineImage::from_path(path);
    session.finish_source_load(ticket, result);
}

/// Run one generation attempt against the given service.
///
/// Validation failures never reach the service; any other outcome lands in
/// the session exactly as [`Session::finish_generate`] applies it.
pub async fn generate(session: &mut Session, service: &dyn EditService) {
    let request = match session.begin_generate() {
        Ok(request) => request,
        Err(_) => return,
    };
    log::info!("requesting edit from {}", service.name());
    let result = service
        .edit(&request.image.data, &request.image.mime_type, &request.prompt)
        .await;
    session.finish_generate(request.ticket, result);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum StubBehavior {
        Respond(EditOutcome),
        Fail(String),
    }

    struct StubService {
        behavior: StubBehavior,
        calls: AtomicUsize,
    }

    impl StubService {
        fn responding(image: Option<&str>, text: Option<&str>) -> Self {
            Self {
                behavior: StubBehavior::Respond(EditOutcome {
                    image: image.map(String::from),
                    text: text.map(String::from),
                }),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing(msg: &str) -> Self {
            Self {
                behavior: StubBehavior::Fail(msg.to_string()),
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl EditService for StubService {
        fn name(&self) -> &str {
            "stub"
        }

        async fn edit(
            &self,
            _image_base64: &str,
            _mime_type: &str,
            _prompt: &str,
        ) -> anyhow::Result<EditOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.behavior {
                StubBehavior::Respond(outcome) => Ok(outcome.clone()),
                StubBehavior::Fail(msg) => anyhow::bail!("{msg}"),
            }
        }
    }

    fn session_with_source() -> Session {
        let mut session = Session::new();
        session.prompt = "make the sky purple".to_string();
        session.source = Some(InlineImage::from_bytes(b"raw image", "image/webp"));
        session
    }

    // ── generate ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn generate_success_sets_edited_image_and_text() {
        let mut session = session_with_source();
        let stub = StubService::responding(Some("X"), Some("Y"));

        generate(&mut session, &stub).await;

        assert_eq!(
            session.edited_image.as_deref(),
            Some("data:image/jpeg;base64,X")
        );
        assert_eq!(session.response_text, "Y");
        assert!(session.error.is_none());
        assert!(!session.loading);
        assert_eq!(stub.call_count(), 1);
    }

    #[tokio::test]
    async fn generate_without_text_uses_default_message() {
        let mut session = session_with_source();
        let stub = StubService::responding(Some("X"), None);

        generate(&mut session, &stub).await;

        assert_eq!(session.response_text, "No text response from the model.");
        assert!(session.error.is_none());
    }

    #[tokio::test]
    async fn generate_with_empty_prompt_never_calls_service() {
        let mut session = session_with_source();
        session.prompt.clear();
        let stub = StubService::responding(Some("X"), Some("Y"));

        generate(&mut session, &stub).await;

        assert_eq!(stub.call_count(), 0);
        assert!(session.error.is_some());
        assert!(session.edited_image.is_none());
        assert!(!session.loading);
    }

    #[tokio::test]
    async fn generate_without_source_never_calls_service() {
        let mut session = Session::new();
        session.prompt = "anything".to_string();
        let stub = StubService::responding(Some("X"), Some("Y"));

        generate(&mut session, &stub).await;

        assert_eq!(stub.call_count(), 0);
        assert!(session.error.is_some());
    }

    #[tokio::test]
    async fn generate_without_image_in_outcome_is_error() {
        let mut session = session_with_source();
        let stub = StubService::responding(None, Some("Y"));

        generate(&mut session, &stub).await;

        assert!(session.edited_image.is_none());
        assert!(session.error.is_some());
        assert!(!session.loading);
    }

    #[tokio::test]
    async fn generate_failure_surfaces_service_message() {
        let mut session = session_with_source();
        let stub = StubService::failing("quota exhausted");

        generate(&mut session, &stub).await;

        let err = session.error.as_deref().unwrap();
        assert!(err.contains("quota exhausted"));
        assert!(session.edited_image.is_none());
        assert!(!session.loading);
    }

    #[tokio::test]
    async fn generate_clears_previous_result() {
        let mut session = session_with_source();
        session.edited_image = Some("data:image/jpeg;base64,OLD".to_string());
        session.response_text = "old text".to_string();
        let stub = StubService::failing("boom");

        generate(&mut session, &stub).await;

        // cleared at the start of the attempt, not restored on failure
        assert!(session.edited_image.is_none());
        assert!(session.response_text.is_empty());
    }

    // ── source load ──────────────────────────────────────────────────

    #[tokio::test]
    async fn upload_sets_source_and_clears_edited_image() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("upload.png");
        std::fs::write(&path, b"png bytes B").unwrap();

        let mut session = session_with_source();
        session.edited_image = Some("data:image/jpeg;base64,OLD".to_string());

        load_source_from_path(&mut session, &path).await;

        let source = session.source.as_ref().unwrap();
        assert_eq!(source.mime_type, "image/png");
        assert_eq!(source.decode().unwrap(), b"png bytes B");
        assert!(session.edited_image.is_none());
        assert!(session.error.is_none());
        assert!(!session.loading);
    }

    #[tokio::test]
    async fn failed_upload_keeps_previous_source() {
        let mut session = session_with_source();
        let before = session.source.clone();

        load_source_from_path(&mut session, Path::new("/nonexistent/x.png")).await;

        assert_eq!(session.source, before);
        assert!(session.error.is_some());
        assert!(!session.loading);
    }

    #[tokio::test]
    async fn fetch_404_leaves_source_unset() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/default.webp")
            .with_status(404)
            .create_async()
            .await;

        let mut session = Session::new();
        let client = reqwest::Client::new();
        let url = format!("{}/default.webp", server.url());

        load_source_from_url(&mut session, &client, &url).await;

        assert!(session.source.is_none());
        assert!(session.error.is_some());
        assert!(!session.loading);
    }

    // ── stale completions ────────────────────────────────────────────

    #[test]
    fn stale_source_load_is_discarded() {
        let mut session = Session::new();
        let old = session.begin_source_load();
        let new = session.begin_source_load();

        let stale = InlineImage::from_bytes(b"stale", "image/png");
        assert!(!session.finish_source_load(old, Ok(stale)));
        assert!(session.source.is_none());
        assert!(session.loading);

        let fresh = InlineImage::from_bytes(b"fresh", "image/png");
        assert!(session.finish_source_load(new, Ok(fresh)));
        assert_eq!(session.source.as_ref().unwrap().decode().unwrap(), b"fresh");
        assert!(!session.loading);
    }

    #[test]
    fn stale_generation_is_discarded() {
        let mut session = session_with_source();
        let old = session.begin_generate().unwrap();
        let new = session.begin_generate().unwrap();

        let stale = EditOutcome {
            image: Some("STALE".to_string()),
            text: None,
        };
        assert!(!session.finish_generate(old.ticket, Ok(stale)));
        assert!(session.edited_image.is_none());

        let fresh = EditOutcome {
            image: Some("FRESH".to_string()),
            text: None,
        };
        assert!(session.finish_generate(new.ticket, Ok(fresh)));
        assert_eq!(
            session.edited_image.as_deref(),
            Some("data:image/jpeg;base64,FRESH")
        );
    }

    #[test]
    fn begin_generate_captures_current_inputs() {
        let mut session = session_with_source();
        let request = session.begin_generate().unwrap();

        assert_eq!(request.prompt, "make the sky purple");
        assert_eq!(request.image.mime_type, "image/webp");
        assert!(session.loading);
        assert!(session.error.is_none());
    }
}
