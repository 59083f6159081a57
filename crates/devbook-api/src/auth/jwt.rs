//! JWT token generation and validation
//!
//! Session tokens are compact JWS strings signed with HMAC-SHA256. Each token
//! carries three claims: `authorized`, `subject_id` and `exp`. Nothing is kept
//! server-side, so a token stays usable until it expires.
//!
//! Validation walks a fixed sequence and stops at the first failure:
//! parse the JOSE header, resolve the key for the declared algorithm, verify the
//! signature, check expiry, check the claim set.

use axum::http::{header, HeaderMap};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use devbook_core::{AuthConfig, UserId};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Claim holding the user id; used for both writing and reading
pub const SUBJECT_CLAIM: &str = "subject_id";

/// Claim that must be `true` for the token to be accepted
pub const AUTHORIZED_CLAIM: &str = "authorized";

/// Claims written into every session token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Always `true` for tokens issued by this service
    pub authorized: bool,
    /// Id of the user the token speaks for
    pub subject_id: UserId,
    /// Expiration timestamp (Unix epoch seconds)
    pub exp: u64,
}

/// JWT token generation and validation errors
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Malformed token: {0}")]
    MalformedInput(String),

    #[error("Invalid token signature")]
    SignatureInvalid,

    #[error("Token has expired")]
    Expired,

    #[error("Missing or invalid claim: {0}")]
    ClaimMissingOrWrongType(String),

    #[error("Failed to encode JWT: {0}")]
    EncodingError(#[from] jsonwebtoken::errors::Error),

    #[error("System time error: {0}")]
    SystemTimeError(#[from] std::time::SystemTimeError),
}

/// Only the `alg` member of the JOSE header is inspected before decoding
#[derive(Deserialize)]
struct JoseHeader {
    alg: String,
}

/// Issues and checks session tokens
///
/// Holds the signing key and token lifetime; cheap to clone and safe to share
/// between request handlers.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_secs: u64,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("ttl_secs", &self.ttl_secs)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    /// Build the service from the process configuration
    pub fn new(config: &AuthConfig) -> Self {
        Self::from_secret(config.secret_key.as_bytes(), config.token_ttl_secs)
    }

    pub fn from_secret(secret: &[u8], ttl_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl_secs,
        }
    }

    /// Token lifetime in seconds
    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    /// Create a signed token for `subject_id`, valid for the configured lifetime
    ///
    /// # Example
    ///
    /// ```no_run
    /// use devbook_api::auth::jwt::TokenService;
    ///
    /// let tokens = TokenService::from_secret(b"change-me", 6 * 60 * 60);
    /// let token = tokens.create(42).expect("Failed to create token");
    /// assert_eq!(tokens.subject_id_of(&token).unwrap(), 42);
    /// ```
    pub fn create(&self, subject_id: UserId) -> Result<String, TokenError> {
        let now = unix_now()?;
        let claims = Claims {
            authorized: true,
            subject_id,
            exp: now.saturating_add(self.ttl_secs),
        };

        self.sign(&claims)
    }

    fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        let token = encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)?;
        Ok(token)
    }

    /// Raw token from an `Authorization: <scheme> <token>` header
    ///
    /// Returns an empty string when the header is absent or does not split on
    /// single spaces into exactly two parts. The scheme itself is not checked.
    pub fn extract_raw(headers: &HeaderMap) -> &str {
        let Some(value) = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
        else {
            return "";
        };

        let mut parts = value.split(' ');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(_scheme), Some(token), None) => token,
            _ => "",
        }
    }

    /// Check the token carried by `headers`
    pub fn validate(&self, headers: &HeaderMap) -> Result<(), TokenError> {
        self.validate_token(Self::extract_raw(headers))
    }

    /// Subject id of the token carried by `headers`
    pub fn extract_subject_id(&self, headers: &HeaderMap) -> Result<UserId, TokenError> {
        self.subject_id_of(Self::extract_raw(headers))
    }

    pub fn validate_token(&self, token: &str) -> Result<(), TokenError> {
        self.decode_claims(token).map(|_| ())
    }

    pub fn subject_id_of(&self, token: &str) -> Result<UserId, TokenError> {
        let claims = self.decode_claims(token)?;

        claims
            .get(SUBJECT_CLAIM)
            .and_then(Value::as_u64)
            .ok_or_else(|| TokenError::ClaimMissingOrWrongType(SUBJECT_CLAIM.to_string()))
    }

    /// Verification key for a declared signing algorithm
    ///
    /// Only the HMAC family resolves. Anything else, `none` included, is
    /// rejected before the key is handed out.
    pub fn resolve_key(&self, alg: &str) -> Result<(Algorithm, &DecodingKey), TokenError> {
        let algorithm = match alg {
            "HS256" => Algorithm::HS256,
            "HS384" => Algorithm::HS384,
            "HS512" => Algorithm::HS512,
            other => {
                tracing::warn!(algorithm = %other, "Rejected token with unexpected signing algorithm");
                return Err(TokenError::SignatureInvalid);
            }
        };

        Ok((algorithm, &self.decoding_key))
    }

    fn decode_claims(&self, token: &str) -> Result<Map<String, Value>, TokenError> {
        if token.is_empty() {
            return Err(TokenError::MalformedInput(
                "no bearer token supplied".to_string(),
            ));
        }

        let declared = declared_algorithm(token)?;
        let (algorithm, key) = self.resolve_key(&declared)?;

        let mut validation = Validation::new(algorithm);
        validation.leeway = 0;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp"]);

        let token_data =
            decode::<Map<String, Value>>(token, key, &validation).map_err(classify)?;

        match token_data.claims.get(AUTHORIZED_CLAIM) {
            Some(Value::Bool(true)) => Ok(token_data.claims),
            _ => Err(TokenError::ClaimMissingOrWrongType(
                AUTHORIZED_CLAIM.to_string(),
            )),
        }
    }
}

/// Read `alg` from the first segment without trusting anything else
fn declared_algorithm(token: &str) -> Result<String, TokenError> {
    let mut segments = token.split('.');
    let (Some(header), Some(_), Some(_), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(TokenError::MalformedInput(
            "expected three dot-separated segments".to_string(),
        ));
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(header)
        .map_err(|_| TokenError::MalformedInput("header is not base64url".to_string()))?;
    let header: JoseHeader = serde_json::from_slice(&bytes)
        .map_err(|_| TokenError::MalformedInput("header is not a JOSE object".to_string()))?;

    Ok(header.alg)
}

fn classify(err: jsonwebtoken::errors::Error) -> TokenError {
    match err.kind() {
        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => TokenError::SignatureInvalid,
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::MissingRequiredClaim(claim) => {
            TokenError::ClaimMissingOrWrongType(claim.clone())
        }
        _ => TokenError::MalformedInput(err.to_string()),
    }
}

fn unix_now() -> Result<u64, TokenError> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use proptest::prelude::*;
    use serde_json::json;

    const SECRET: &[u8] = b"test-secret-key";

    fn service() -> TokenService {
        TokenService::from_secret(SECRET, 6 * 60 * 60)
    }

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    fn bearer(token: &str) -> HeaderMap {
        headers_with(&format!("Bearer {token}"))
    }

    fn b64(value: &Value) -> String {
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(value).unwrap())
    }

    fn sign_raw(claims: &Value, alg: Algorithm, secret: &[u8]) -> String {
        encode(&Header::new(alg), claims, &EncodingKey::from_secret(secret)).unwrap()
    }

    #[test]
    fn test_create_and_extract_subject_id() {
        let tokens = service();
        let token = tokens.create(42).expect("Failed to create token");

        let headers = bearer(&token);
        assert!(tokens.validate(&headers).is_ok());
        assert_eq!(tokens.extract_subject_id(&headers).unwrap(), 42);
    }

    #[test]
    fn test_claims_written_under_canonical_keys() {
        let token = service().create(7).unwrap();
        let payload = token.split('.').nth(1).unwrap();
        let claims: Value = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(payload).unwrap()).unwrap();

        assert_eq!(claims[SUBJECT_CLAIM], 7);
        assert_eq!(claims[AUTHORIZED_CLAIM], true);

        let now = unix_now().unwrap();
        let exp = claims["exp"].as_u64().unwrap();
        assert!(exp >= now + 6 * 60 * 60 - 5 && exp <= now + 6 * 60 * 60);
    }

    #[test]
    fn test_wrong_secret() {
        let token = TokenService::from_secret(b"secret1", 3600).create(1).unwrap();
        let result = TokenService::from_secret(b"secret2", 3600).validate(&bearer(&token));

        assert!(matches!(result, Err(TokenError::SignatureInvalid)));
    }

    #[test]
    fn test_expired_token() {
        let tokens = service();
        let now = unix_now().unwrap();

        // Signed correctly, expired 1 hour ago
        let token = tokens
            .sign(&Claims {
                authorized: true,
                subject_id: 5,
                exp: now - 3600,
            })
            .unwrap();

        assert!(matches!(
            tokens.validate(&bearer(&token)),
            Err(TokenError::Expired)
        ));
        assert!(matches!(
            tokens.extract_subject_id(&bearer(&token)),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn test_tampered_signature() {
        let tokens = service();
        let token = tokens.create(42).unwrap();

        let (signed_part, signature) = token.rsplit_once('.').unwrap();
        let first = signature.chars().next().unwrap();
        let replacement = if first == 'A' { 'B' } else { 'A' };
        let tampered = format!("{signed_part}.{replacement}{}", &signature[1..]);

        assert!(matches!(
            tokens.validate(&bearer(&tampered)),
            Err(TokenError::SignatureInvalid)
        ));
    }

    #[test]
    fn test_tampered_claims() {
        let tokens = service();
        let token = tokens.create(42).unwrap();
        let parts: Vec<&str> = token.split('.').collect();

        let forged = b64(&json!({"authorized": true, "subject_id": 1, "exp": u64::MAX}));
        let tampered = format!("{}.{}.{}", parts[0], forged, parts[2]);

        assert!(matches!(
            tokens.validate(&bearer(&tampered)),
            Err(TokenError::SignatureInvalid)
        ));
    }

    #[test]
    fn test_alg_none_rejected() {
        let tokens = service();
        let header = b64(&json!({"alg": "none", "typ": "JWT"}));
        let claims = b64(&json!({"authorized": true, "subject_id": 1, "exp": u64::MAX}));

        for token in [format!("{header}.{claims}."), format!("{header}.{claims}.c2ln")] {
            assert!(matches!(
                tokens.validate(&bearer(&token)),
                Err(TokenError::SignatureInvalid)
            ));
        }
    }

    #[test]
    fn test_resolver_whitelist() {
        let tokens = service();

        for alg in ["HS256", "HS384", "HS512"] {
            assert!(tokens.resolve_key(alg).is_ok(), "{alg} should resolve");
        }
        for alg in ["none", "None", "RS256", "ES256", "PS512", "EdDSA", "hs256", ""] {
            assert!(
                matches!(tokens.resolve_key(alg), Err(TokenError::SignatureInvalid)),
                "{alg} should be rejected"
            );
        }
    }

    #[test]
    fn test_asymmetric_alg_rejected() {
        let tokens = service();
        let header = b64(&json!({"alg": "RS256", "typ": "JWT"}));
        let claims = b64(&json!({"authorized": true, "subject_id": 1, "exp": u64::MAX}));
        let token = format!("{header}.{claims}.c2lnbmF0dXJl");

        assert!(matches!(
            tokens.validate(&bearer(&token)),
            Err(TokenError::SignatureInvalid)
        ));
    }

    #[test]
    fn test_other_hmac_variants_accepted() {
        let tokens = service();
        let claims = json!({"authorized": true, "subject_id": 9, "exp": u64::MAX});

        for alg in [Algorithm::HS384, Algorithm::HS512] {
            let token = sign_raw(&claims, alg, SECRET);
            assert_eq!(tokens.subject_id_of(&token).unwrap(), 9);
        }
    }

    #[test]
    fn test_malformed_tokens() {
        let tokens = service();

        for token in ["", "invalid.token.here", "onlyonesegment", "a.b", "a.b.c.d"] {
            assert!(
                matches!(
                    tokens.validate_token(token),
                    Err(TokenError::MalformedInput(_))
                ),
                "{token:?} should be malformed"
            );
        }
    }

    #[test]
    fn test_missing_header_fails_validation() {
        let result = service().validate(&HeaderMap::new());
        assert!(matches!(result, Err(TokenError::MalformedInput(_))));
    }

    #[test]
    fn test_extract_raw() {
        assert_eq!(TokenService::extract_raw(&HeaderMap::new()), "");
        assert_eq!(TokenService::extract_raw(&headers_with("Bearer")), "");
        assert_eq!(TokenService::extract_raw(&headers_with("Bearer abc")), "abc");
        assert_eq!(TokenService::extract_raw(&headers_with("Token abc")), "abc");
        assert_eq!(TokenService::extract_raw(&headers_with("Bearer a b")), "");
        assert_eq!(TokenService::extract_raw(&headers_with("Bearer  abc")), "");
    }

    #[test]
    fn test_unauthorized_claim_rejected() {
        let tokens = service();
        let token = sign_raw(
            &json!({"authorized": false, "subject_id": 3, "exp": u64::MAX}),
            Algorithm::HS256,
            SECRET,
        );

        assert!(matches!(
            tokens.validate_token(&token),
            Err(TokenError::ClaimMissingOrWrongType(claim)) if claim == AUTHORIZED_CLAIM
        ));
    }

    #[test]
    fn test_missing_exp_rejected() {
        let tokens = service();
        let token = sign_raw(
            &json!({"authorized": true, "subject_id": 3}),
            Algorithm::HS256,
            SECRET,
        );

        assert!(matches!(
            tokens.validate_token(&token),
            Err(TokenError::ClaimMissingOrWrongType(claim)) if claim == "exp"
        ));
    }

    #[test]
    fn test_bad_subject_claims() {
        let tokens = service();
        let bad_subjects = [
            json!({"authorized": true, "exp": u64::MAX}),
            json!({"authorized": true, "subject_id": "42", "exp": u64::MAX}),
            json!({"authorized": true, "subject_id": -1, "exp": u64::MAX}),
            json!({"authorized": true, "subject_id": 4.5, "exp": u64::MAX}),
            json!({"authorized": true, "usuarioId": 42, "exp": u64::MAX}),
        ];

        for claims in bad_subjects {
            let token = sign_raw(&claims, Algorithm::HS256, SECRET);
            // Signature and expiry are fine, only the subject is unusable
            assert!(tokens.validate_token(&token).is_ok());
            assert!(matches!(
                tokens.subject_id_of(&token),
                Err(TokenError::ClaimMissingOrWrongType(claim)) if claim == SUBJECT_CLAIM
            ));
        }
    }

    #[test]
    fn test_debug_hides_key() {
        let debug = format!("{:?}", service());
        assert!(!debug.contains("test-secret-key"));
    }

    proptest! {
        #[test]
        fn prop_subject_id_roundtrip(subject_id in any::<u64>()) {
            let tokens = service();
            let token = tokens.create(subject_id).unwrap();
            prop_assert_eq!(tokens.extract_subject_id(&bearer(&token)).unwrap(), subject_id);
        }
    }
}
