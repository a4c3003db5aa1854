// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! HTTP transport.
//!
//! The client talks to the endpoint through the [`Transport`] trait so the
//! write path can be driven without a network. [`HttpTransport`] is the
//! production implementation on top of `reqwest`'s blocking client.

use std::time::Duration;
use thiserror::Error;

use crate::auth::{Credentials, SignedHeaders, CONTENT_TYPE};

/// Transport-level failures, before any HTTP status is known.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The connection could not be established.
    #[error("could not connect: {0}")]
    Connect(String),

    /// The request did not complete in time.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Sending the request (headers or body) failed.
    #[error("failed to send request: {0}")]
    Write(String),

    /// Anything else (bad URL, TLS setup, redirect loop, ...).
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Connect, timeout and write failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, TransportError::Other(_))
    }
}

/// A signed POST of one batch.
#[derive(Debug, Clone)]
pub struct PostRequest<'a> {
    pub url: &'a str,
    pub headers: Vec<(&'static str, String)>,
    pub body: &'a [u8],
}

impl<'a> PostRequest<'a> {
    /// Request carrying the standard write headers.
    pub fn signed(url: &'a str, signed: SignedHeaders, body: &'a [u8]) -> Self {
        Self {
            url,
            headers: vec![
                ("Content-Type", CONTENT_TYPE.to_string()),
                ("Date", signed.date),
                ("Authorization", signed.authorization),
                ("Accept-Encoding", "gzip".to_string()),
            ],
            body,
        }
    }

    /// Request authorized by a pre-issued token. No `Date` is sent.
    pub fn with_token(url: &'a str, token: &str, body: &'a [u8]) -> Self {
        Self {
            url,
            headers: vec![
                ("Content-Type", CONTENT_TYPE.to_string()),
                ("Authorization", token.to_string()),
                ("Accept-Encoding", "gzip".to_string()),
            ],
            body,
        }
    }

    /// Request for a write to `repo` issued now.
    pub fn authorized(
        url: &'a str,
        credentials: &Credentials,
        repo: &str,
        body: &'a [u8],
    ) -> Self {
        match credentials {
            Credentials::Keys(signer) => Self::signed(url, signer.sign_now(repo), body),
            Credentials::Token(token) => Self::with_token(url, token, body),
        }
    }

    /// Value of the first header named `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Performs one HTTP POST and reports the response status.
pub trait Transport: Send + Sync {
    fn post(&self, request: &PostRequest<'_>) -> Result<u16, TransportError>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn post(&self, request: &PostRequest<'_>) -> Result<u16, TransportError> {
        (**self).post(request)
    }
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn post(&self, request: &PostRequest<'_>) -> Result<u16, TransportError> {
        (**self).post(request)
    }
}

/// `reqwest` blocking transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| TransportError::Other(e.to_string()))?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn post(&self, request: &PostRequest<'_>) -> Result<u16, TransportError> {
        let mut builder = self.client.post(request.url);
        for (name, value) in &request.headers {
            builder = builder.header(*name, value.as_str());
        }

        let response = builder
            .body(request.body.to_vec())
            .send()
            .map_err(classify_reqwest_error)?;

        Ok(response.status().as_u16())
    }
}

fn classify_reqwest_error(e: reqwest::Error) -> TransportError {
    let message = e.to_string();
    if e.is_connect() {
        TransportError::Connect(message)
    } else if e.is_timeout() {
        TransportError::Timeout(message)
    } else if e.is_request() || e.is_body() {
        TransportError::Write(message)
    } else {
        TransportError::Other(message)
    }
}
