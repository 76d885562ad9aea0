//! Payload hygiene and manifest-summary gating (§4.10 steps 1-2).

use serde_json::Value;

use crate::auth::ClientIdentity;
use crate::error::VerifyError;

const REJECTED_KEYS: &[&str] = &["media", "file", "binary", "payload", "image", "video", "audio", "blob"];
const MAX_STRING_LEN: usize = 512;
const DEFAULT_MANIFEST_SUMMARY_FIELDS: &[&str] =
    &["title", "creator", "capture_time_utc", "description"];

/// Recursively walks `value` rejecting media-like key names (all mapped to
/// [`VerifyError::MediaPayloadNotAllowed`], including `"binary"`),
/// data-URI-looking strings, and oversized strings (except within
/// `manifest_summary`, checked separately by [`check_manifest_summary`]).
///
/// [`VerifyError::BinaryPayloadNotAllowed`] is reserved for byte-typed
/// values, a separate rule from the key-name check; `serde_json::Value` has
/// no byte variant, so it is unreachable from this walk, matching upstream.
pub fn check_payload_hygiene(value: &Value) -> Result<(), VerifyError> {
    walk(value, false)
}

fn walk(value: &Value, inside_manifest_summary: bool) -> Result<(), VerifyError> {
    match value {
        Value::Object(map) => {
            for (key, v) in map {
                let lower = key.to_ascii_lowercase();
                if REJECTED_KEYS.contains(&lower.as_str()) {
                    return Err(VerifyError::MediaPayloadNotAllowed);
                }
                let nested = inside_manifest_summary || key == "manifest_summary";
                walk(v, nested)?;
            }
            Ok(())
        }
        Value::Array(items) => {
            for item in items {
                walk(item, inside_manifest_summary)?;
            }
            Ok(())
        }
        Value::String(s) => {
            let lower = s.to_ascii_lowercase();
            if lower.contains("data:image") || lower.contains("base64,") {
                return Err(VerifyError::MediaPayloadNotAllowed);
            }
            if !inside_manifest_summary && s.len() > MAX_STRING_LEN {
                return Err(VerifyError::UnexpectedFieldSize);
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Validates an optional `manifest_summary` object against the client's
/// permission, the configured field whitelist, and the byte-size cap.
pub fn check_manifest_summary(
    manifest_summary: Option<&Value>,
    identity: &ClientIdentity,
    allowed_fields: &[String],
    max_bytes: usize,
) -> Result<(), VerifyError> {
    let Some(summary) = manifest_summary else {
        return Ok(());
    };

    if !identity.allow_manifest_summary {
        return Err(VerifyError::ManifestSummaryNotAllowed);
    }

    let allowed: Vec<&str> = if allowed_fields.is_empty() {
        DEFAULT_MANIFEST_SUMMARY_FIELDS.to_vec()
    } else {
        allowed_fields.iter().map(|s| s.as_str()).collect()
    };

    if let Value::Object(map) = summary {
        for key in map.keys() {
            if !allowed.contains(&key.as_str()) {
                return Err(VerifyError::ManifestSummaryContainsDisallowedFields);
            }
        }
    }

    let encoded_len = serde_json::to_string(summary).unwrap_or_default().len();
    if encoded_len > max_bytes {
        return Err(VerifyError::ManifestSummaryTooLarge);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_media_key() {
        let payload = json!({"content_hash": "c", "image": "x"});
        assert!(matches!(
            check_payload_hygiene(&payload),
            Err(VerifyError::MediaPayloadNotAllowed)
        ));
    }

    #[test]
    fn rejects_binary_key_as_media_payload() {
        let payload = json!({"binary": [1, 2, 3]});
        assert!(matches!(
            check_payload_hygiene(&payload),
            Err(VerifyError::MediaPayloadNotAllowed)
        ));
    }

    #[test]
    fn rejects_data_uri_strings() {
        let payload = json!({"note": "data:image/png;base64,AAAA"});
        assert!(check_payload_hygiene(&payload).is_err());
    }

    #[test]
    fn rejects_oversized_strings_outside_manifest_summary() {
        let payload = json!({"note": "a".repeat(513)});
        assert!(matches!(
            check_payload_hygiene(&payload),
            Err(VerifyError::UnexpectedFieldSize)
        ));
    }

    #[test]
    fn allows_long_strings_inside_manifest_summary() {
        let payload = json!({"manifest_summary": {"description": "a".repeat(600)}});
        assert!(check_payload_hygiene(&payload).is_ok());
    }

    fn identity(allow_summary: bool) -> ClientIdentity {
        ClientIdentity {
            api_key: None,
            name: "anon".to_string(),
            authenticated: false,
            rate_limit_per_minute: 60,
            allow_manifest_summary: allow_summary,
        }
    }

    #[test]
    fn manifest_summary_requires_permission() {
        let summary = json!({"title": "t"});
        let err = check_manifest_summary(Some(&summary), &identity(false), &[], 4096).unwrap_err();
        assert!(matches!(err, VerifyError::ManifestSummaryNotAllowed));
    }

    #[test]
    fn manifest_summary_rejects_disallowed_field() {
        let summary = json!({"secret_key": "t"});
        let err = check_manifest_summary(Some(&summary), &identity(true), &[], 4096).unwrap_err();
        assert!(matches!(
            err,
            VerifyError::ManifestSummaryContainsDisallowedFields
        ));
    }

    #[test]
    fn manifest_summary_rejects_oversized_payload() {
        let summary = json!({"description": "a".repeat(5000)});
        let err = check_manifest_summary(Some(&summary), &identity(true), &[], 4096).unwrap_err();
        assert!(matches!(err, VerifyError::ManifestSummaryTooLarge));
    }

    #[test]
    fn manifest_summary_allows_whitelisted_fields() {
        let summary = json!({"title": "t", "creator": "c"});
        assert!(check_manifest_summary(Some(&summary), &identity(true), &[], 4096).is_ok());
    }
}
