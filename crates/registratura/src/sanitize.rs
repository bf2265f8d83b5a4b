//! Helpers for sanitizing names before they reach storage paths, and data
//! before it enters tracing span attributes.
//!
//! Sender addresses and push endpoints identify citizens; spans carry
//! only redacted forms of them.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Reduces a filename to ASCII alphanumerics plus `.`, `_` and `-`.
/// Every other character becomes `_`; an empty result becomes `file`.
///
/// `cerere semnată.pdf` → `cerere_semnat_.pdf`
pub fn safe_storage_name(filename: &str) -> String {
    let safe: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    // A name made only of dots would resolve to the directory itself.
    if safe.is_empty() || safe.chars().all(|c| c == '.') {
        "file".to_string()
    } else {
        safe
    }
}

/// Keeps the first character of the local part and the domain.
///
/// - `ion.popescu@example.ro` → `i***@example.ro`
/// - `not-an-address` → `***`
pub fn redact_email(address: &str) -> String {
    match address.trim().split_once('@') {
        Some((local, domain)) if !local.is_empty() => {
            let first = local.chars().next().unwrap_or('*');
            format!("{}***@{}", first, domain)
        }
        _ => "***".to_string(),
    }
}

/// Keeps the scheme and host of a URL and drops the path, which for push
/// endpoints is a bearer capability.
///
/// `https://fcm.googleapis.com/fcm/send/abc` → `https://fcm.googleapis.com/…`
pub fn redact_url(url: &str) -> String {
    if let Some(scheme_end) = url.find("://") {
        let after_scheme = &url[scheme_end + 3..];
        let host = after_scheme
            .split(['/', '?', '#'])
            .next()
            .unwrap_or("")
            .rsplit('@')
            .next()
            .unwrap_or("");
        return format!("{}{}/…", &url[..scheme_end + 3], host);
    }
    "<invalid-url>".to_string()
}

/// Returns a short deterministic hash for correlating log lines without
/// exposing the value.
pub fn short_hash(value: &str) -> String {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_storage_name_replaces_unsafe_characters() {
        assert_eq!(safe_storage_name("cerere semnată.pdf"), "cerere_semnat_.pdf");
        assert_eq!(safe_storage_name("../../etc/passwd"), ".._.._etc_passwd");
        assert_eq!(safe_storage_name("Plan-2025_v2.DOCX"), "Plan-2025_v2.DOCX");
    }

    #[test]
    fn test_safe_storage_name_never_empty_or_dots() {
        assert_eq!(safe_storage_name(""), "file");
        assert_eq!(safe_storage_name(".."), "file");
        assert_eq!(safe_storage_name("ăîș"), "___");
    }

    #[test]
    fn test_redact_email() {
        assert_eq!(redact_email("ion.popescu@example.ro"), "i***@example.ro");
        assert_eq!(redact_email("@example.ro"), "***");
        assert_eq!(redact_email("nobody"), "***");
    }

    #[test]
    fn test_redact_url() {
        assert_eq!(
            redact_url("https://fcm.googleapis.com/fcm/send/abc?x=1"),
            "https://fcm.googleapis.com/…"
        );
        assert_eq!(
            redact_url("https://user:pw@push.example.com/x"),
            "https://push.example.com/…"
        );
        assert_eq!(redact_url("garbage"), "<invalid-url>");
    }

    #[test]
    fn test_short_hash_deterministic() {
        assert_eq!(short_hash("abc"), short_hash("abc"));
        assert_ne!(short_hash("abc"), short_hash("abd"));
        assert_eq!(short_hash("abc").len(), 16);
    }
}
