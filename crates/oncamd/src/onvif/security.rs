//! WS-Security `UsernameToken` with password digest.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, TimeDelta, Utc};
use sha1::{Digest, Sha1};

use crate::device_service::Credentials;

use super::xml::escape;

const WSSE_NS: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd";
const WSU_NS: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd";
const DIGEST_TYPE: &str = "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-username-token-profile-1.0#PasswordDigest";
const NONCE_ENCODING: &str = "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-soap-message-security-1.0#Base64Binary";

/// A single-use token; build a fresh one for every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct UsernameToken {
    username: String,
    digest: String,
    nonce: String,
    created: String,
}

impl UsernameToken {
    /// Token with a random nonce, stamped with the camera's idea of now.
    ///
    /// `clock_offset` is the camera clock minus ours.
    pub(super) fn generate(credentials: &Credentials, clock_offset: TimeDelta) -> Self {
        Self::with_nonce(credentials, Utc::now() + clock_offset, rand::random())
    }

    /// `PasswordDigest = Base64(SHA1(nonce + created + password))`.
    pub(super) fn with_nonce(
        credentials: &Credentials,
        created_at: DateTime<Utc>,
        nonce: [u8; 16],
    ) -> Self {
        let created = created_at.format("%Y-%m-%dT%H:%M:%SZ").to_string();
        let mut hasher = Sha1::new();
        hasher.update(nonce);
        hasher.update(created.as_bytes());
        hasher.update(credentials.pass.as_bytes());
        Self {
            username: credentials.user.clone(),
            digest: STANDARD.encode(hasher.finalize()),
            nonce: STANDARD.encode(nonce),
            created,
        }
    }

    /// `<wsse:Security>` header block.
    pub(super) fn to_header(&self) -> String {
        format!(
            concat!(
                r#"<wsse:Security s:mustUnderstand="1" xmlns:wsse="{wsse}" xmlns:wsu="{wsu}">"#,
                "<wsse:UsernameToken>",
                "<wsse:Username>{username}</wsse:Username>",
                r#"<wsse:Password Type="{digest_type}">{digest}</wsse:Password>"#,
                r#"<wsse:Nonce EncodingType="{encoding}">{nonce}</wsse:Nonce>"#,
                "<wsu:Created>{created}</wsu:Created>",
                "</wsse:UsernameToken>",
                "</wsse:Security>"
            ),
            wsse = WSSE_NS,
            wsu = WSU_NS,
            username = escape(&self.username),
            digest_type = DIGEST_TYPE,
            digest = self.digest,
            encoding = NONCE_ENCODING,
            nonce = self.nonce,
            created = self.created,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn token() -> UsernameToken {
        let created = Utc
            .with_ymd_and_hms(2026, 1, 2, 3, 4, 5)
            .single()
            .expect("valid timestamp");
        let nonce: [u8; 16] = std::array::from_fn(|index| u8::try_from(index).expect("small"));
        UsernameToken::with_nonce(&Credentials::new("admin", "secret"), created, nonce)
    }

    #[test]
    fn digest_matches_reference_vector() {
        let token = token();
        assert_eq!(token.digest, "kFEsDyAWyMvuU4XN4w6Dym/sfO4=");
        assert_eq!(token.nonce, "AAECAwQFBgcICQoLDA0ODw==");
        assert_eq!(token.created, "2026-01-02T03:04:05Z");
    }

    #[test]
    fn header_escapes_username() {
        let mut token = token();
        token.username = "a<b".to_owned();
        let header = token.to_header();
        assert!(header.contains("<wsse:Username>a&lt;b</wsse:Username>"));
        assert!(header.contains("<wsu:Created>2026-01-02T03:04:05Z</wsu:Created>"));
    }

    #[test]
    fn generated_tokens_use_fresh_nonces() {
        let credentials = Credentials::new("admin", "secret");
        let first = UsernameToken::generate(&credentials, TimeDelta::zero());
        let second = UsernameToken::generate(&credentials, TimeDelta::zero());
        assert_ne!(first.nonce, second.nonce);
    }

    #[test]
    fn generated_tokens_follow_camera_clock() {
        let credentials = Credentials::new("admin", "secret");
        let behind = TimeDelta::hours(-3);
        let token = UsernameToken::generate(&credentials, behind);
        let created = DateTime::parse_from_rfc3339(&token.created)
            .expect("created timestamp")
            .with_timezone(&Utc);
        let drift = (Utc::now() + behind) - created;
        assert!(drift.num_seconds().abs() <= 2, "created {created} drifted by {drift}");
    }
}
