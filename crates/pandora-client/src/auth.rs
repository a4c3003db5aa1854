// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Request signing.
//!
//! Every write is authorized with an HMAC-SHA1 over a canonical string:
//!
//! ```text
//! POST\n
//! \n
//! text/plain\n
//! Thu, 15 Oct 2026 08:30:00 GMT\n
//! /v2/repos/<repo>/data
//! ```
//!
//! The digest is base64 encoded with the URL-safe alphabet (padding kept)
//! and sent as `Authorization: Pandora <access_key>:<digest>`. The `Date`
//! header must carry the exact string that was signed.
//!
//! A pre-issued repo token can be used instead of a key pair. It is sent as
//! the `Authorization` header verbatim and nothing is signed.

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use std::fmt;

use crate::error::{Error, Result};

type HmacSha1 = Hmac<Sha1>;

/// Authorization scheme name.
pub const AUTH_SCHEME: &str = "Pandora";

/// Content type of every write request.
pub const CONTENT_TYPE: &str = "text/plain";

/// HTTP method of every write request.
pub const METHOD: &str = "POST";

/// RFC 1123 date, always GMT.
const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Format `at` as an HTTP `Date` header value.
pub fn http_date(at: DateTime<Utc>) -> String {
    at.format(HTTP_DATE_FORMAT).to_string()
}

/// URL path of the data endpoint for `repo`.
pub fn data_path(repo: &str) -> String {
    format!("/v2/repos/{}/data", repo)
}

/// Canonical string signed for a write to `path` at `date`.
pub fn string_to_sign(date: &str, path: &str) -> String {
    format!("{}\n\n{}\n{}\n{}", METHOD, CONTENT_TYPE, date, path)
}

/// Headers produced by signing one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    /// Value of the `Date` header, identical to the signed date.
    pub date: String,
    /// Value of the `Authorization` header.
    pub authorization: String,
}

/// Signs write requests with an access/secret key pair.
#[derive(Clone)]
pub struct Signer {
    access_key: String,
    mac: HmacSha1,
}

impl Signer {
    pub fn new(access_key: &str, secret_key: &str) -> Result<Self> {
        if access_key.is_empty() {
            return Err(Error::InvalidArgument("access key is empty".to_string()));
        }
        if secret_key.is_empty() {
            return Err(Error::InvalidArgument("secret key is empty".to_string()));
        }
        let mac = HmacSha1::new_from_slice(secret_key.as_bytes())
            .map_err(|e| Error::InvalidArgument(format!("secret key: {}", e)))?;

        Ok(Self {
            access_key: access_key.to_string(),
            mac,
        })
    }

    pub fn access_key(&self) -> &str {
        &self.access_key
    }

    /// Sign a write to `repo` using `date` verbatim.
    pub fn sign(&self, repo: &str, date: String) -> SignedHeaders {
        let digest = self.digest(&string_to_sign(&date, &data_path(repo)));
        SignedHeaders {
            date,
            authorization: format!("{} {}:{}", AUTH_SCHEME, self.access_key, digest),
        }
    }

    /// Sign a write to `repo` dated now.
    pub fn sign_now(&self, repo: &str) -> SignedHeaders {
        self.sign(repo, http_date(Utc::now()))
    }

    /// URL-safe base64 of HMAC-SHA1(secret_key, message).
    pub fn digest(&self, message: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(message.as_bytes());
        URL_SAFE.encode(mac.finalize().into_bytes())
    }
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// How write requests are authorized.
#[derive(Clone)]
pub enum Credentials {
    /// Every request is signed with an access/secret key pair.
    Keys(Signer),
    /// A pre-issued token sent as-is.
    Token(String),
}

impl Credentials {
    pub fn keys(access_key: &str, secret_key: &str) -> Result<Self> {
        Signer::new(access_key, secret_key).map(Credentials::Keys)
    }

    /// Token credentials. The token must be non-empty and fit in one header line.
    pub fn token(token: &str) -> Result<Self> {
        if token.is_empty() {
            return Err(Error::InvalidArgument("token is empty".to_string()));
        }
        if token.chars().any(char::is_control) {
            return Err(Error::InvalidArgument(
                "token contains control characters".to_string(),
            ));
        }
        Ok(Credentials::Token(token.to_string()))
    }

    pub fn is_token(&self) -> bool {
        matches!(self, Credentials::Token(_))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Keys(signer) => f.debug_tuple("Keys").field(signer).finish(),
            Credentials::Token(_) => f.debug_tuple("Token").field(&"<redacted>").finish(),
        }
    }
}
