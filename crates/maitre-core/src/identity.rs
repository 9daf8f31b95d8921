//! Canonical user identity.
//!
//! WhatsApp addresses the same account several ways: the modern
//! `@s.whatsapp.net` suffix, the legacy `@c.us` suffix, device-qualified
//! JIDs (`5511999887766:12@s.whatsapp.net`), and bare phone digits.
//! All conversation state is keyed by one canonical form; every lookup
//! normalizes first.

/// The canonical JID server suffix.
pub const CANONICAL_SUFFIX: &str = "s.whatsapp.net";

/// Legacy server suffix still produced by some transports.
const LEGACY_SUFFIX: &str = "c.us";

/// Normalize a transport-specific user id to its canonical form.
///
/// - `5511999887766` → `5511999887766@s.whatsapp.net`
/// - `5511999887766@c.us` → `5511999887766@s.whatsapp.net`
/// - `5511999887766:12@s.whatsapp.net` → `5511999887766@s.whatsapp.net`
/// - surrounding whitespace is dropped, the server part is lowercased
pub fn canonical_user_id(raw: &str) -> String {
    let trimmed = raw.trim();

    let (user, server) = match trimmed.split_once('@') {
        Some((user, server)) => (user, server.to_ascii_lowercase()),
        None => (trimmed, CANONICAL_SUFFIX.to_string()),
    };

    // Strip the device/agent qualifier from the user part.
    let user = user.split(':').next().unwrap_or(user);
    let user = user.split('.').next().unwrap_or(user);

    let server = if server == LEGACY_SUFFIX {
        CANONICAL_SUFFIX.to_string()
    } else {
        server
    };

    format!("{user}@{server}")
}

/// The bare phone part of a canonical id, for display.
pub fn phone_of(canonical: &str) -> &str {
    canonical.split('@').next().unwrap_or(canonical)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_digits_get_suffix() {
        assert_eq!(
            canonical_user_id("5511999887766"),
            "5511999887766@s.whatsapp.net"
        );
    }

    #[test]
    fn test_legacy_suffix_mapped() {
        assert_eq!(
            canonical_user_id("5511999887766@c.us"),
            "5511999887766@s.whatsapp.net"
        );
    }

    #[test]
    fn test_device_qualifier_stripped() {
        assert_eq!(
            canonical_user_id("5511999887766:12@s.whatsapp.net"),
            "5511999887766@s.whatsapp.net"
        );
    }

    #[test]
    fn test_variants_collapse_to_same_id() {
        let a = canonical_user_id("972501234567@c.us");
        let b = canonical_user_id("972501234567@s.whatsapp.net");
        let c = canonical_user_id(" 972501234567 ");
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn test_canonical_is_idempotent() {
        let once = canonical_user_id("5511999887766@c.us");
        assert_eq!(canonical_user_id(&once), once);
    }

    #[test]
    fn test_phone_of() {
        assert_eq!(phone_of("5511999887766@s.whatsapp.net"), "5511999887766");
    }
}
