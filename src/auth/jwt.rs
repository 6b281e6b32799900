use crate::auth::clock::{Clock, SystemClock};
use crate::types::{Identity, Role};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Why a presented token was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    /// Not a parseable JWT at all.
    #[error("Malformed token: {0}")]
    Malformed(String),

    /// Parsed, but the signature (or the declared algorithm) does not check out.
    #[error("Token signature mismatch")]
    InvalidSignature,

    /// Signature is good but the token is past its expiry.
    #[error("Token expired")]
    Expired,

    /// Signature is good but a required claim is absent or unusable.
    #[error("Token is missing required claim '{0}'")]
    MissingClaims(String),

    /// Signing failed while minting a token.
    #[error("Failed to issue token: {0}")]
    Issuance(String),
}

/// Signature-verified token payload.
///
/// Only [`TokenAuthority::validate`] produces values of this type, so holding
/// a `Claims` means the token it came from was checked. Handlers carry this
/// value around instead of re-reading the raw token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Claims {
    sub: String,
    role: Role,
    iat: i64,
    exp: i64,
}

impl Claims {
    /// Subject of the token (the account email).
    pub fn email(&self) -> &str {
        &self.sub
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.iat, 0).unwrap_or_default()
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or_default()
    }

    pub fn identity(&self) -> Identity {
        Identity::new(self.sub.clone(), self.role)
    }
}

/// Payload as it arrives on the wire, before required claims are enforced.
#[derive(Debug, Deserialize)]
struct WireClaims {
    sub: Option<String>,
    role: Option<String>,
    iat: Option<i64>,
    exp: Option<i64>,
}

/// A freshly minted token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues and validates HS256 session tokens.
///
/// The signing secret is loaded once at startup and never leaves this struct.
/// Expiry is checked against the injected [`Clock`] with no leeway: a token is
/// valid while `now <= exp`.
pub struct TokenAuthority {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl TokenAuthority {
    /// Shortest signing secret accepted at startup.
    pub const MIN_SECRET_LEN: usize = 32;

    /// Creates an authority using the wall clock.
    ///
    /// # Arguments
    /// * `secret` - HMAC key (at least [`MIN_SECRET_LEN`](Self::MIN_SECRET_LEN) bytes)
    /// * `ttl` - Token validity from issuance
    pub fn new(secret: &SecretString, ttl: Duration) -> Self {
        Self::with_clock(secret, ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(secret: &SecretString, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        let key = secret.expose_secret().as_bytes();

        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is enforced against our own clock after the signature check
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims::<&str>(&[]);

        Self {
            encoding_key: EncodingKey::from_secret(key),
            decoding_key: DecodingKey::from_secret(key),
            validation,
            ttl,
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Mints a token for `identity` valid for the configured TTL.
    pub fn issue(&self, identity: &Identity) -> Result<IssuedToken, TokenError> {
        let now = self.clock.now();
        let expires_at = now
            .checked_add_signed(self.ttl)
            .ok_or_else(|| TokenError::Issuance("token lifetime out of range".to_string()))?;

        let claims = Claims {
            sub: identity.email.clone(),
            role: identity.role,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Issuance(e.to_string()))?;

        Ok(IssuedToken { token, expires_at })
    }

    /// Verifies a token and returns its claims.
    ///
    /// The signature is checked before any claim is looked at.
    pub fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        let data = decode::<WireClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| classify(token, e))?;
        let wire = data.claims;

        let sub = wire
            .sub
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| TokenError::MissingClaims("sub".to_string()))?;
        let role = wire
            .role
            .as_deref()
            .and_then(|r| r.parse::<Role>().ok())
            .ok_or_else(|| TokenError::MissingClaims("role".to_string()))?;
        let iat = wire
            .iat
            .ok_or_else(|| TokenError::MissingClaims("iat".to_string()))?;
        let exp = wire
            .exp
            .ok_or_else(|| TokenError::MissingClaims("exp".to_string()))?;

        if self.clock.now().timestamp() > exp {
            return Err(TokenError::Expired);
        }

        Ok(Claims { sub, role, iat, exp })
    }
}

impl fmt::Debug for TokenAuthority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenAuthority")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

fn classify(token: &str, err: jsonwebtoken::errors::Error) -> TokenError {
    match err.kind() {
        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => TokenError::InvalidSignature,
        ErrorKind::Base64(_) if signature_segment_corrupt(token) => TokenError::InvalidSignature,
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::MissingRequiredClaim(claim) => TokenError::MissingClaims(claim.clone()),
        _ => TokenError::Malformed(err.to_string()),
    }
}

/// True when the header decodes but the signature segment is not valid
/// base64url. The header is parsed before the signature is decoded, so a
/// base64 failure in that state came from an edited signature.
fn signature_segment_corrupt(token: &str) -> bool {
    let mut segments = token.split('.');
    match (segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some(header), Some(_), Some(signature), None) => {
            URL_SAFE_NO_PAD.decode(header).is_ok() && URL_SAFE_NO_PAD.decode(signature).is_err()
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::clock::ManualClock;

    const SECRET: &str = "test-secret-key-that-is-at-least-32-chars";

    fn create_test_authority() -> (TokenAuthority, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_now());
        let authority = TokenAuthority::with_clock(
            &SecretString::from(SECRET),
            Duration::seconds(900),
            clock.clone(),
        );
        (authority, clock)
    }

    fn flip(c: char) -> char {
        if c == 'A' {
            'B'
        } else {
            'A'
        }
    }

    fn tamper_at(token: &str, index: usize) -> String {
        token
            .char_indices()
            .map(|(i, c)| if i == index { flip(c) } else { c })
            .collect()
    }

    fn sign_raw(payload: &serde_json::Value, algorithm: Algorithm) -> String {
        encode(
            &Header::new(algorithm),
            payload,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .expect("should sign raw payload")
    }

    #[test]
    fn test_issue_and_validate_round_trip() {
        let (authority, clock) = create_test_authority();

        for identity in [
            Identity::new("admin@example.com", Role::Sysadmin),
            Identity::new("manager@example.com", Role::Manager),
            Identity::new("candidate@example.com", Role::Candidate),
        ] {
            let issued = authority.issue(&identity).expect("should issue token");
            let claims = authority
                .validate(&issued.token)
                .expect("should validate token");

            assert_eq!(claims.email(), identity.email);
            assert_eq!(claims.role(), identity.role);
            assert_eq!(claims.identity(), identity);
            assert_eq!(claims.issued_at(), clock.now());
            assert_eq!(claims.expires_at(), issued.expires_at);
            assert_eq!(claims.expires_at() - claims.issued_at(), Duration::seconds(900));
        }
    }

    #[test]
    fn test_token_valid_just_before_expiry() {
        let (authority, clock) = create_test_authority();
        let issued = authority
            .issue(&Identity::new("user@example.com", Role::Candidate))
            .expect("should issue");

        clock.advance(Duration::seconds(899));
        assert!(authority.validate(&issued.token).is_ok());

        clock.advance(Duration::seconds(1));
        assert!(
            authority.validate(&issued.token).is_ok(),
            "token is still valid at exactly exp"
        );
    }

    #[test]
    fn test_token_expired_after_ttl() {
        let (authority, clock) = create_test_authority();
        let issued = authority
            .issue(&Identity::new("user@example.com", Role::Candidate))
            .expect("should issue");

        clock.advance(Duration::seconds(901));

        assert_eq!(authority.validate(&issued.token), Err(TokenError::Expired));
    }

    #[test]
    fn test_tampered_signature_rejected() {
        let (authority, _clock) = create_test_authority();

        for email in ["a@x.com", "someone.else@example.org", "z@z.io"] {
            let issued = authority
                .issue(&Identity::new(email, Role::Manager))
                .expect("should issue");
            let signature_start = issued.token.rfind('.').expect("three segments") + 1;
            let middle = signature_start + (issued.token.len() - signature_start) / 2;
            let last = issued.token.len() - 1;

            for index in [signature_start, middle, last] {
                let tampered = tamper_at(&issued.token, index);
                assert_ne!(tampered, issued.token);
                assert_eq!(
                    authority.validate(&tampered),
                    Err(TokenError::InvalidSignature),
                    "flipping signature byte {} should break the signature",
                    index
                );
            }
        }
    }

    #[test]
    fn test_any_edit_to_final_signature_symbol_rejected() {
        let (authority, _clock) = create_test_authority();

        // 32 signature bytes leave 4 unused bits in the last symbol, so most
        // replacements there are not even decodable base64url
        for n in 0..20 {
            let issued = authority
                .issue(&Identity::new(&format!("user{}@example.com", n), Role::Candidate))
                .expect("should issue");
            let (body, last) = issued.token.split_at(issued.token.len() - 1);

            for replacement in ['A', 'B', 'Q', 'f', 'g', 'w', '_', '-', '9'] {
                if last.starts_with(replacement) {
                    continue;
                }
                let tampered = format!("{}{}", body, replacement);
                assert_eq!(
                    authority.validate(&tampered),
                    Err(TokenError::InvalidSignature),
                    "replacing the final signature symbol with {:?} should break the signature",
                    replacement
                );
            }
        }
    }

    #[test]
    fn test_garbled_header_is_malformed() {
        let (authority, _clock) = create_test_authority();
        let issued = authority
            .issue(&Identity::new("user@example.com", Role::Candidate))
            .expect("should issue");
        let rest = issued.token.split_once('.').expect("three segments").1;

        let tampered = format!("e!J.{}", rest);
        assert!(matches!(
            authority.validate(&tampered),
            Err(TokenError::Malformed(_))
        ));
    }

    #[test]
    fn test_out_of_range_lifetime_fails_issuance() {
        let authority = TokenAuthority::with_clock(
            &SecretString::from(SECRET),
            Duration::MAX,
            Arc::new(ManualClock::starting_now()),
        );

        assert!(matches!(
            authority.issue(&Identity::new("user@example.com", Role::Candidate)),
            Err(TokenError::Issuance(_))
        ));
    }

    #[test]
    fn test_escalated_payload_rejected() {
        let (authority, clock) = create_test_authority();
        let issued = authority
            .issue(&Identity::new("candidate@example.com", Role::Candidate))
            .expect("should issue");

        let segments: Vec<&str> = issued.token.split('.').collect();
        let forged_payload = serde_json::json!({
            "sub": "candidate@example.com",
            "role": "SYSADMIN",
            "iat": clock.now().timestamp(),
            "exp": clock.now().timestamp() + 900,
        });
        let forged_payload = URL_SAFE_NO_PAD.encode(forged_payload.to_string());
        let forged = format!("{}.{}.{}", segments[0], forged_payload, segments[2]);

        assert_eq!(authority.validate(&forged), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn test_token_verification_wrong_secret() {
        let clock = Arc::new(ManualClock::starting_now());
        let one = TokenAuthority::with_clock(
            &SecretString::from("secret-one-that-is-32-chars-long"),
            Duration::seconds(900),
            clock.clone(),
        );
        let two = TokenAuthority::with_clock(
            &SecretString::from("secret-two-that-is-32-chars-long"),
            Duration::seconds(900),
            clock,
        );

        let issued = one
            .issue(&Identity::new("user@example.com", Role::Candidate))
            .expect("should issue");

        assert_eq!(two.validate(&issued.token), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn test_malformed_tokens() {
        let (authority, _clock) = create_test_authority();

        for token in ["", "not-a-jwt", "invalid.token.here", "a.b", "...."] {
            assert!(
                matches!(authority.validate(token), Err(TokenError::Malformed(_))),
                "{:?} should be malformed",
                token
            );
        }
    }

    #[test]
    fn test_missing_role_claim() {
        let (authority, clock) = create_test_authority();
        let token = sign_raw(
            &serde_json::json!({
                "sub": "user@example.com",
                "iat": clock.now().timestamp(),
                "exp": clock.now().timestamp() + 60,
            }),
            Algorithm::HS256,
        );

        assert_eq!(
            authority.validate(&token),
            Err(TokenError::MissingClaims("role".to_string()))
        );
    }

    #[test]
    fn test_missing_subject_claim() {
        let (authority, clock) = create_test_authority();
        let token = sign_raw(
            &serde_json::json!({
                "role": "MANAGER",
                "iat": clock.now().timestamp(),
                "exp": clock.now().timestamp() + 60,
            }),
            Algorithm::HS256,
        );

        assert_eq!(
            authority.validate(&token),
            Err(TokenError::MissingClaims("sub".to_string()))
        );
    }

    #[test]
    fn test_unknown_role_is_unusable() {
        let (authority, clock) = create_test_authority();
        let token = sign_raw(
            &serde_json::json!({
                "sub": "user@example.com",
                "role": "ROLE_USER",
                "iat": clock.now().timestamp(),
                "exp": clock.now().timestamp() + 60,
            }),
            Algorithm::HS256,
        );

        assert_eq!(
            authority.validate(&token),
            Err(TokenError::MissingClaims("role".to_string()))
        );
    }

    #[test]
    fn test_other_algorithm_rejected() {
        let (authority, clock) = create_test_authority();
        let token = sign_raw(
            &serde_json::json!({
                "sub": "user@example.com",
                "role": "SYSADMIN",
                "iat": clock.now().timestamp(),
                "exp": clock.now().timestamp() + 60,
            }),
            Algorithm::HS512,
        );

        assert_eq!(authority.validate(&token), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn test_debug_does_not_leak_secret() {
        let (authority, _clock) = create_test_authority();
        let rendered = format!("{:?}", authority);

        assert!(!rendered.contains(SECRET));
    }
}
