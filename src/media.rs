//! Image uploads stored inline as `data:` URLs.

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MediaError {
    #[error("Please select an image file (got {0})")]
    UnsupportedType(String),

    #[error("Image must be smaller than {limit} bytes (got {size})")]
    TooLarge { size: usize, limit: usize },

    #[error("Image data is not a valid base64 data URL")]
    MalformedDataUrl,
}

/// An uploaded file as received from a multipart form.
#[derive(Debug, Clone, Default)]
pub struct ImageUpload {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    /// Browsers send an empty part when no file was picked.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Declared MIME type, falling back to a guess from the file name.
    pub fn mime(&self) -> String {
        self.content_type
            .as_deref()
            .map(str::trim)
            .filter(|ct| !ct.is_empty() && *ct != "application/octet-stream")
            .map(str::to_ascii_lowercase)
            .or_else(|| {
                self.file_name
                    .as_deref()
                    .and_then(|name| mime_guess::from_path(name).first())
                    .map(|m| m.essence_str().to_string())
            })
            .unwrap_or_else(|| "application/octet-stream".to_string())
    }

    /// Check type and size. `limit` is exclusive.
    pub fn validate(&self, limit: usize) -> Result<String, MediaError> {
        let mime = self.mime();
        if !mime.starts_with("image/") {
            return Err(MediaError::UnsupportedType(mime));
        }
        if self.bytes.len() >= limit {
            return Err(MediaError::TooLarge {
                size: self.bytes.len(),
                limit,
            });
        }
        Ok(mime)
    }

    /// Validate and encode as a self-contained data URL.
    pub fn to_data_url(&self, limit: usize) -> Result<String, MediaError> {
        let mime = self.validate(limit)?;
        Ok(encode_data_url(&mime, &self.bytes))
    }
}

pub fn encode_data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, B64.encode(bytes))
}

pub fn is_data_url(value: &str) -> bool {
    value.starts_with("data:")
}

/// Check a `data:<mime>;base64,<payload>` URL against the same rules as an
/// upload: image type, decoded size below `limit`.
pub fn check_data_url(value: &str, limit: usize) -> Result<(), MediaError> {
    let (header, payload) = value
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(','))
        .ok_or(MediaError::MalformedDataUrl)?;
    let mime = header
        .strip_suffix(";base64")
        .ok_or(MediaError::MalformedDataUrl)?
        .to_ascii_lowercase();
    if !mime.starts_with("image/") {
        return Err(MediaError::UnsupportedType(mime));
    }

    // Reject oversized payloads before decoding them
    let estimated = payload.len() / 4 * 3;
    if estimated >= limit + 3 {
        return Err(MediaError::TooLarge {
            size: estimated,
            limit,
        });
    }

    let size = B64
        .decode(payload)
        .map_err(|_| MediaError::MalformedDataUrl)?
        .len();
    if size >= limit {
        return Err(MediaError::TooLarge { size, limit });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(content_type: Option<&str>, name: Option<&str>, len: usize) -> ImageUpload {
        ImageUpload {
            file_name: name.map(String::from),
            content_type: content_type.map(String::from),
            bytes: vec![0u8; len],
        }
    }

    #[test]
    fn accepts_small_png() {
        let up = upload(Some("image/png"), Some("a.png"), 10);
        assert_eq!(up.validate(100).unwrap(), "image/png");
    }

    #[test]
    fn rejects_non_image() {
        let up = upload(Some("application/pdf"), Some("a.pdf"), 10);
        assert_eq!(
            up.validate(100),
            Err(MediaError::UnsupportedType("application/pdf".into()))
        );
    }

    #[test]
    fn limit_is_exclusive() {
        assert!(upload(Some("image/jpeg"), None, 99).validate(100).is_ok());
        assert_eq!(
            upload(Some("image/jpeg"), None, 100).validate(100),
            Err(MediaError::TooLarge {
                size: 100,
                limit: 100
            })
        );
    }

    #[test]
    fn guesses_type_from_name_when_undeclared() {
        let up = upload(Some("application/octet-stream"), Some("cat.gif"), 1);
        assert_eq!(up.mime(), "image/gif");
        let up = upload(None, Some("notes.txt"), 1);
        assert_eq!(up.mime(), "text/plain");
        let up = upload(None, None, 1);
        assert!(up.validate(10).is_err());
    }

    #[test]
    fn data_url_shape() {
        let up = ImageUpload {
            file_name: None,
            content_type: Some("image/png".into()),
            bytes: b"hi".to_vec(),
        };
        let url = up.to_data_url(1024).unwrap();
        assert_eq!(url, "data:image/png;base64,aGk=");
        assert!(is_data_url(&url));
    }

    #[test]
    fn data_url_check_matches_upload_rules() {
        let small = encode_data_url("image/png", &[0u8; 10]);
        assert_eq!(check_data_url(&small, 100), Ok(()));

        let exact = encode_data_url("image/png", &[0u8; 100]);
        assert_eq!(
            check_data_url(&exact, 100),
            Err(MediaError::TooLarge {
                size: 100,
                limit: 100
            })
        );

        let huge = encode_data_url("image/png", &vec![0u8; 4096]);
        assert!(matches!(
            check_data_url(&huge, 100),
            Err(MediaError::TooLarge { .. })
        ));

        let html = encode_data_url("text/html", b"<p>");
        assert_eq!(
            check_data_url(&html, 100),
            Err(MediaError::UnsupportedType("text/html".into()))
        );
    }

    #[test]
    fn malformed_data_urls_are_rejected() {
        assert_eq!(
            check_data_url("data:image/png,raw", 100),
            Err(MediaError::MalformedDataUrl)
        );
        assert_eq!(
            check_data_url("data:image/png;base64,@@@@", 100),
            Err(MediaError::MalformedDataUrl)
        );
        assert_eq!(
            check_data_url("data:image/png;base64", 100),
            Err(MediaError::MalformedDataUrl)
        );
    }

    #[test]
    fn empty_upload_is_empty() {
        assert!(ImageUpload::default().is_empty());
    }
}
