use anyhow::Context;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use tracing::warn;
use uuid::Uuid;

use crate::{error::AppError, state::AppState};

pub const MAX_PHOTO_BYTES: usize = 10 * 1024 * 1024;
const PRESIGN_TTL_SECS: u64 = 30 * 60;

/// Decoded upload ready for object storage.
#[derive(Debug)]
pub struct Photo {
    pub body: Bytes,
    pub content_type: &'static str,
}

pub(crate) fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}

fn canonical_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("image/jpeg"),
        "image/png" => Some("image/png"),
        "image/webp" => Some("image/webp"),
        "image/heic" => Some("image/heic"),
        _ => None,
    }
}

/// Content type from the file's magic bytes.
fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        [0x89, b'P', b'N', b'G', ..] => Some("image/png"),
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some("image/webp"),
        [_, _, _, _, b'f', b't', b'y', b'p', b'h', b'e', b'i', b'c', ..] => Some("image/heic"),
        _ => None,
    }
}

/// Accepts a `data:image/...;base64,` URL or bare base64.
pub fn decode_photo(raw: &str) -> Result<Photo, AppError> {
    let raw = raw.trim();
    let (declared, payload) = match raw.strip_prefix("data:") {
        Some(rest) => {
            let (header, payload) = rest
                .split_once(',')
                .ok_or_else(|| AppError::validation("photo", "Malformed data URL"))?;
            let mime = header
                .strip_suffix(";base64")
                .ok_or_else(|| AppError::validation("photo", "Photo must be base64 encoded"))?;
            (Some(mime.to_ascii_lowercase()), payload)
        }
        None => (None, raw),
    };
    if payload.is_empty() {
        return Err(AppError::validation("photo", "Photo is required"));
    }
    let bytes = STANDARD
        .decode(payload)
        .map_err(|_| AppError::validation("photo", "Photo is not valid base64"))?;
    if bytes.len() > MAX_PHOTO_BYTES {
        return Err(AppError::validation("photo", "Photo must be 10 MB or smaller"));
    }
    let content_type = declared
        .as_deref()
        .and_then(canonical_mime)
        .or_else(|| sniff_mime(&bytes))
        .ok_or_else(|| {
            AppError::validation("photo", "Photo must be a JPEG, PNG, WebP or HEIC image")
        })?;
    Ok(Photo {
        body: Bytes::from(bytes),
        content_type,
    })
}

pub fn photo_key(user_id: Uuid, visit_id: Uuid, content_type: &str) -> String {
    let ext = ext_from_mime(content_type).unwrap_or("bin");
    format!("verified-visits/{user_id}/{visit_id}.{ext}")
}

pub async fn upload(st: &AppState, key: &str, photo: Photo) -> anyhow::Result<()> {
    st.storage
        .put_object(key, photo.body, photo.content_type)
        .await
        .with_context(|| format!("put_object {key}"))
}

/// Best-effort removal; a leftover object is only logged.
pub async fn remove(st: &AppState, key: &str) {
    if let Err(e) = st.storage.delete_object(key).await {
        warn!(error = %e, %key, "photo delete failed");
    }
}

pub async fn presign(st: &AppState, key: &str) -> Option<String> {
    match st.storage.presign_get(key, PRESIGN_TTL_SECS).await {
        Ok(url) => Some(url),
        Err(e) => {
            warn!(error = %e, %key, "presign failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn test_ext_from_mime() {
        assert_eq!(ext_from_mime("image/jpeg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/jpg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/png"), Some("png"));
        assert_eq!(ext_from_mime("image/webp"), Some("webp"));
        assert_eq!(ext_from_mime("image/heic"), Some("heic"));
        assert_eq!(ext_from_mime("application/octet-stream"), None);
    }

    #[test]
    fn data_url_uses_declared_type() {
        let url = format!("data:image/jpg;base64,{}", STANDARD.encode([1u8, 2, 3]));
        let photo = decode_photo(&url).unwrap();
        assert_eq!(photo.content_type, "image/jpeg");
        assert_eq!(photo.body.as_ref(), &[1, 2, 3]);
    }

    #[test]
    fn bare_base64_is_sniffed() {
        let photo = decode_photo(&STANDARD.encode(PNG_HEADER)).unwrap();
        assert_eq!(photo.content_type, "image/png");
    }

    #[test]
    fn rejects_garbage_and_unknown_types() {
        let status = |r: Result<Photo, AppError>| r.unwrap_err().status().as_u16();
        assert_eq!(status(decode_photo("not base64 !!")), 422);
        assert_eq!(status(decode_photo(&STANDARD.encode(b"plain text"))), 422);
        assert_eq!(status(decode_photo("data:image/png,abc")), 422);
        assert_eq!(status(decode_photo("")), 422);
    }

    #[test]
    fn keys_are_namespaced_per_user() {
        let user = Uuid::nil();
        let visit = Uuid::nil();
        assert_eq!(
            photo_key(user, visit, "image/webp"),
            format!("verified-visits/{user}/{visit}.webp")
        );
    }

    #[tokio::test]
    async fn presigned_url_contains_key() {
        let state = AppState::fake();
        let url = presign(&state, "verified-visits/a/b.jpg").await.unwrap();
        assert!(url.contains("verified-visits/a/b.jpg"));
    }
}
