//! Per-call request state carried through the refresh protocol

use reqwest::Request;

/// An outbound call and whether it has already been replayed after a refresh
///
/// A context is replayed at most once. Marking it retried consumes it, so the
/// flag can only move from `false` to `true`.
#[derive(Debug)]
pub struct RequestContext {
    request: Request,
    retried: bool,
    credential: Option<String>,
}

impl RequestContext {
    pub fn new(request: Request) -> Self {
        Self {
            request,
            retried: false,
            credential: None,
        }
    }

    pub fn retried(&self) -> bool {
        self.retried
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Access token the latest attempt was sent with
    pub fn credential(&self) -> Option<&str> {
        self.credential.as_deref()
    }

    pub fn record_credential(&mut self, token: Option<String>) {
        self.credential = token;
    }

    /// The same call, flagged as retried
    pub fn into_retried(self) -> Self {
        Self {
            retried: true,
            ..self
        }
    }

    /// A fresh copy of the request for one dispatch attempt
    ///
    /// `None` for streaming bodies, which cannot be sent twice.
    pub fn attempt(&self) -> Option<Request> {
        self.request.try_clone()
    }
}
