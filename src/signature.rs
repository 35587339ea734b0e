//! Request signing and expiry.
//!
//! A request carries an expiry (unix seconds) and a lowercase hex
//! HMAC-SHA256 over a canonical message:
//!
//! - `GET`: the public URL of the request with the `signature` query
//!   parameter removed and the remaining parameters sorted by key
//! - `POST`: `"<expires>:<raw body>"`

use hmac::digest::{Key, KeyInit};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use url::Url;
use url::form_urlencoded;

use crate::error::AuthError;

type HmacSha256 = Hmac<Sha256>;

/// Query parameter carrying the signature on `GET` requests.
pub const SIGNATURE_PARAM: &str = "signature";
/// Query parameter carrying the expiry on `GET` requests.
pub const EXPIRES_PARAM: &str = "expires";
/// Header carrying the signature on `POST` requests.
pub const SIGNATURE_HEADER: &str = "x-zipfly-signature";
/// Header carrying the expiry on `POST` requests.
pub const EXPIRES_HEADER: &str = "x-zipfly-expires";

/// Hex-encoded HMAC-SHA256 length.
const SIGNATURE_LEN: usize = 64;

/// Sign `message` with `secret`, returning lowercase hex.
pub fn sign(secret: &[u8], message: &[u8]) -> String {
    hex::encode(mac(secret, message).finalize().into_bytes())
}

fn mac(secret: &[u8], message: &[u8]) -> HmacSha256 {
    let mut mac = <HmacSha256 as KeyInit>::new(&block_key(secret));
    mac.update(message);
    mac
}

/// Expand `secret` to one SHA-256 block the way HMAC does: keys longer than
/// a block are hashed first, shorter ones are zero padded.
fn block_key(secret: &[u8]) -> Key<HmacSha256> {
    let mut key = Key::<HmacSha256>::default();
    if secret.len() > key.len() {
        let digest = <Sha256 as Digest>::digest(secret);
        key[..digest.len()].copy_from_slice(&digest);
    } else {
        key[..secret.len()].copy_from_slice(secret);
    }
    key
}

/// Canonical message for a `POST` request.
pub fn post_message(expires: &str, body: &[u8]) -> Vec<u8> {
    let mut message = Vec::with_capacity(expires.len() + 1 + body.len());
    message.extend_from_slice(expires.as_bytes());
    message.push(b':');
    message.extend_from_slice(body);
    message
}

/// Checks request signatures against a shared secret.
#[derive(Clone)]
pub struct SignatureValidator {
    secret: Vec<u8>,
    public_url: Url,
}

impl std::fmt::Debug for SignatureValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureValidator")
            .field("public_url", &self.public_url.as_str())
            .finish_non_exhaustive()
    }
}

impl SignatureValidator {
    /// `public_url` is the externally visible base URL (scheme, host and
    /// port) used to rebuild the URL a `GET` request was signed over.
    pub fn new(secret: impl Into<Vec<u8>>, public_url: Url) -> Self {
        Self {
            secret: secret.into(),
            public_url,
        }
    }

    /// Core check against the current time.
    pub fn validate(&self, signature: &str, expires: &str, message: &[u8]) -> bool {
        self.verify(signature, expires, message).is_ok()
    }

    /// Like [`validate`](Self::validate) but reports why a check failed.
    pub fn verify(&self, signature: &str, expires: &str, message: &[u8]) -> Result<(), AuthError> {
        self.verify_at(signature, expires, message, chrono::Utc::now().timestamp())
    }

    /// Check `signature` over `message` as of the unix time `now`.
    ///
    /// An expiry equal to `now` is still valid.
    pub fn verify_at(
        &self,
        signature: &str,
        expires: &str,
        message: &[u8],
        now: i64,
    ) -> Result<(), AuthError> {
        if signature.is_empty() || expires.is_empty() {
            return Err(AuthError::MissingSignature);
        }

        let expires_at: i64 = expires.parse().map_err(|_| AuthError::InvalidExpiry)?;
        if now > expires_at {
            return Err(AuthError::Expired);
        }

        // Only the shape is checked here; the content comparison below is
        // constant time.
        let well_formed = signature.len() == SIGNATURE_LEN
            && signature
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        let supplied = match hex::decode(signature) {
            Ok(bytes) if well_formed => bytes,
            _ => return Err(AuthError::SignatureMismatch),
        };

        mac(&self.secret, message)
            .verify_slice(&supplied)
            .map_err(|_| AuthError::SignatureMismatch)
    }

    /// Validate a `GET` request from its path and raw query string.
    pub fn validate_from_query(&self, path: &str, query: &str) -> Result<(), AuthError> {
        let (signature, expires) = signature_from_query(query);
        let message = self.canonical_url(path, query);
        self.verify(&signature, &expires, message.as_bytes())
    }

    /// Validate a `POST` request from its signing headers and raw body.
    pub fn validate_from_headers(
        &self,
        signature: Option<&str>,
        expires: Option<&str>,
        body: &[u8],
    ) -> Result<(), AuthError> {
        let signature = signature.unwrap_or_default();
        let expires = expires.unwrap_or_default();
        self.verify(signature, expires, &post_message(expires, body))
    }

    /// Rebuild the URL a `GET` request was signed over: the public base URL
    /// with the request path and every query parameter except `signature`,
    /// sorted by key and form-encoded.
    ///
    /// Only ASCII letters, digits and `-_.~` are left bare; `*` is
    /// percent-encoded and spaces become `+`.
    pub fn canonical_url(&self, path: &str, query: &str) -> String {
        let mut pairs: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .filter(|(key, _)| key != SIGNATURE_PARAM)
            .collect();
        // Stable: repeated keys keep their relative order
        pairs.sort_by(|a, b| a.0.cmp(&b.0));

        let mut url = self.public_url.clone();
        url.set_path(path);
        if pairs.is_empty() {
            url.set_query(None);
        } else {
            let encoded = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(&pairs)
                .finish();
            url.set_query(Some(&unreserved_tilde(&encoded)));
        }
        url.set_fragment(None);
        url.to_string()
    }
}

/// Form encoding leaves `*` bare and escapes `~`; flip both so `~` is the
/// only symbol besides `-_.` that stays unescaped. A literal `%` is always
/// encoded as `%25`, so `%7E` here can only come from `~`.
fn unreserved_tilde(encoded: &str) -> String {
    encoded.replace('*', "%2A").replace("%7E", "~")
}

/// First `signature` and `expires` values of a query, empty when either is
/// missing.
fn signature_from_query(query: &str) -> (String, String) {
    let mut signature = None;
    let mut expires = None;

    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        match &*key {
            SIGNATURE_PARAM if signature.is_none() => signature = Some(value.into_owned()),
            EXPIRES_PARAM if expires.is_none() => expires = Some(value.into_owned()),
            _ => {}
        }
    }

    match (signature, expires) {
        (Some(signature), Some(expires)) => (signature, expires),
        _ => (String::new(), String::new()),
    }
}

/// Whether requests must carry a valid signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignaturePolicy {
    Enforced,
    Bypassed,
}

impl SignaturePolicy {
    /// Signatures are enforced in production or when explicitly required.
    pub fn new(environment: &str, validate_signature: bool) -> Self {
        if validate_signature || environment == "production" {
            Self::Enforced
        } else {
            Self::Bypassed
        }
    }

    pub fn is_enforced(self) -> bool {
        self == Self::Enforced
    }
}
