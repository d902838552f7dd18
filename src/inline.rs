//! Inline (base64) image representation and acquisition.
//!
//! Everything the app moves around — the fetched source image, the uploaded
//! file, the edited result — travels as an [`InlineImage`]: a mime type plus
//! a base64 payload, the text-safe form the edit service consumes and the
//! display layer reconstitutes into a `data:` URI.

use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::error::RetouchError;

/// Mime type assumed when neither headers, extension, nor magic bytes say
/// otherwise.
const FALLBACK_MIME: &str = "image/jpeg";

/// An image in text-transportable form: a mime type and a base64 payload.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineImage {
    /// Declared mime type, e.g. `"image/webp"`.
    pub mime_type: String,
    /// The image bytes, base64-encoded (standard alphabet, padded).
    pub data: String,
}

impl InlineImage {
    /// Encode raw bytes under the given mime type.
    pub fn from_bytes(bytes: &[u8], mime_type: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: STANDARD.encode(bytes),
        }
    }

    /// Fetch an image over HTTP.
    ///
    /// Any non-success status is a load failure. The mime type comes from the
    /// response's `Content-Type` header, falling back to magic-byte sniffing
    /// when the header is missing or not an image type.
    pub async fn fetch(client: &reqwest::Client, url: &str) -> Result<Self, RetouchError> {
        let resp = client
            .get(url)
            .send()
            .await
            .map_err(|e| RetouchError::Load(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(RetouchError::Load(format!("HTTP {status} from {url}")));
        }

        let declared = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .filter(|v| v.starts_with("image/"));

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| RetouchError::Load(e.to_string()))?;

        let mime_type = declared
            .or_else(|| sniff_mime(&bytes).map(str::to_string))
            .unwrap_or_else(|| FALLBACK_MIME.to_string());

        log::debug!("fetched {url}: {} bytes, {mime_type}", bytes.len());
        Ok(Self::from_bytes(&bytes, mime_type))
    }

    /// Read an image from a local file.
    ///
    /// The mime type is derived from the file extension, with magic-byte
    /// sniffing as fallback for files with unhelpful names.
    pub fn from_path(path: &Path) -> Result<Self, RetouchError> {
        let bytes = std::fs::read(path)
            .map_err(|e| RetouchError::Read(format!("{}: {e}", path.display())))?;

        let mime_type = mime_for_path(path)
            .or_else(|| sniff_mime(&bytes))
            .unwrap_or(FALLBACK_MIME);

        Ok(Self::from_bytes(&bytes, mime_type))
    }

    /// Render as a displayable `data:<mime>;base64,<payload>` URI.
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }

    /// Parse a `data:` URI back into its mime type and payload.
    ///
    /// The payload is everything after the first comma, taken verbatim.
    /// Returns `None` when the URI has no comma or no `data:` prefix.
    pub fn from_data_uri(uri: &str) -> Option<Self> {
        let (header, payload) = uri.split_once(',')?;
        let header = header.strip_prefix("data:")?;
        let mime = header.split(';').next().unwrap_or("");
        Some(Self {
            mime_type: if mime.is_empty() {
                FALLBACK_MIME.to_string()
            } else {
                mime.to_string()
            },
            data: payload.to_string(),
        })
    }

    /// Decode the base64 payload back into raw bytes.
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(&self.data)
    }
}

/// Mime type for a file path, by extension.
pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        "tif" | "tiff" => Some("image/tiff"),
        _ => None,
    }
}

/// Detect an image mime type from magic bytes.
pub fn sniff_mime(data: &[u8]) -> Option<&'static str> {
    if data.len() < 12 {
        return None;
    }
    // PNG: 89 50 4E 47 0D 0A 1A 0A
    if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some("image/png");
    }
    // JPEG: FF D8 FF
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("image/jpeg");
    }
    // WebP: RIFF....WEBP
    if data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
        return Some("image/webp");
    }
    // GIF: GIF87a / GIF89a
    if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        return Some("image/gif");
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: [u8; 12] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

    // ── from_bytes / data URI codec ──────────────────────────────────

    #[test]
    fn from_bytes_encodes_standard_base64() {
        let img = InlineImage::from_bytes(b"hello", "image/png");
        assert_eq!(img.mime_type, "image/png");
        assert_eq!(img.data, "aGVsbG8=");
    }

    #[test]
    fn data_uri_round_trip() {
        let img = InlineImage::from_bytes(b"\x00\x01\x02\xff", "image/webp");
        let uri = img.to_data_uri();
        assert!(uri.starts_with("data:image/webp;base64,"));

        let back = InlineImage::from_data_uri(&uri).unwrap();
        assert_eq!(back.mime_type, "image/webp");
        assert_eq!(back.data, img.data);
    }

    #[test]
    fn data_uri_payload_taken_verbatim_after_first_comma() {
        // any base64-alphabet payload must survive, including '+' and '/'
        let uri = "data:image/png;base64,ab+/CD==";
        let img = InlineImage::from_data_uri(uri).unwrap();
        assert_eq!(img.data, "ab+/CD==");
        assert_eq!(img.to_data_uri(), uri);
    }

    #[test]
    fn data_uri_without_comma_rejected() {
        assert!(InlineImage::from_data_uri("data:image/png;base64").is_none());
    }

    #[test]
    fn data_uri_without_prefix_rejected() {
        assert!(InlineImage::from_data_uri("image/png;base64,AAAA").is_none());
    }

    #[test]
    fn decode_inverts_from_bytes() {
        let img = InlineImage::from_bytes(b"round trip", "image/png");
        assert_eq!(img.decode().unwrap(), b"round trip");
    }

    #[test]
    fn decode_rejects_garbage() {
        let img = InlineImage {
            mime_type: "image/png".into(),
            data: "not base64!!".into(),
        };
        assert!(img.decode().is_err());
    }

    // ── mime derivation ──────────────────────────────────────────────

    #[test]
    fn mime_for_known_extensions() {
        assert_eq!(mime_for_path(Path::new("a.jpg")), Some("image/jpeg"));
        assert_eq!(mime_for_path(Path::new("a.JPEG")), Some("image/jpeg"));
        assert_eq!(mime_for_path(Path::new("a.png")), Some("image/png"));
        assert_eq!(mime_for_path(Path::new("a.webp")), Some("image/webp"));
    }

    #[test]
    fn mime_for_unknown_extension() {
        assert_eq!(mime_for_path(Path::new("a.txt")), None);
        assert_eq!(mime_for_path(Path::new("noext")), None);
    }

    #[test]
    fn sniff_png_jpeg_webp() {
        assert_eq!(sniff_mime(&PNG_MAGIC), Some("image/png"));
        assert_eq!(
            sniff_mime(&[0xFF, 0xD8, 0xFF, 0xE0, 0, 0, 0, 0, 0, 0, 0, 0]),
            Some("image/jpeg")
        );
        assert_eq!(sniff_mime(b"RIFF\x00\x00\x00\x00WEBP"), Some("image/webp"));
        assert_eq!(sniff_mime(b"not an image at all"), None);
    }

    // ── from_path ────────────────────────────────────────────────────

    #[test]
    fn from_path_uses_extension_and_encodes_bytes() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("pic.png");
        std::fs::write(&path, b"fake png bytes").unwrap();

        let img = InlineImage::from_path(&path).unwrap();
        assert_eq!(img.mime_type, "image/png");
        assert_eq!(img.decode().unwrap(), b"fake png bytes");
    }

    #[test]
    fn from_path_sniffs_when_extension_unhelpful() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("pic.img");
        std::fs::write(&path, PNG_MAGIC).unwrap();

        let img = InlineImage::from_path(&path).unwrap();
        assert_eq!(img.mime_type, "image/png");
    }

    #[test]
    fn from_path_missing_file_is_read_error() {
        let err = InlineImage::from_path(Path::new("/nonexistent/pic.png")).unwrap_err();
        assert!(matches!(err, RetouchError::Read(_)));
    }

    // ── fetch ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn fetch_success_uses_content_type_header() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/original.webp")
            .with_status(200)
            .with_header("content-type", "image/webp")
            .with_body(b"webp bytes")
            .create_async()
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/original.webp", server.url());
        let img = InlineImage::fetch(&client, &url).await.unwrap();

        assert_eq!(img.mime_type, "image/webp");
        assert_eq!(img.decode().unwrap(), b"webp bytes");
    }

    #[tokio::test]
    async fn fetch_not_found_is_load_error() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/missing.webp")
            .with_status(404)
            .create_async()
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/missing.webp", server.url());
        let err = InlineImage::fetch(&client, &url).await.unwrap_err();

        assert!(matches!(err, RetouchError::Load(_)));
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn fetch_sniffs_mime_when_header_missing() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/headerless")
            .with_status(200)
            .with_header("content-type", "application/octet-stream")
            .with_body(PNG_MAGIC.as_slice())
            .create_async()
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/headerless", server.url());
        let img = InlineImage::fetch(&client, &url).await.unwrap();
        assert_eq!(img.mime_type, "image/png");
    }
}
