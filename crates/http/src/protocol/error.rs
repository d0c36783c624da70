use std::convert::Infallible;
use std::io;
use thiserror::Error;

/// Errors raised while reading a request body or producing a response body.
#[derive(Error, Debug)]
pub enum BodyError {
    #[error("request body exceeds the limit of {limit} bytes")]
    TooManyBytes { limit: u64 },

    #[error("connection terminated: {reason}")]
    ConnectionTerminated { reason: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl BodyError {
    pub fn too_many_bytes(limit: u64) -> Self {
        Self::TooManyBytes { limit }
    }

    pub fn connection_terminated<S: ToString>(reason: S) -> Self {
        Self::ConnectionTerminated { reason: reason.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }

    /// Returns true if the transport behind this body is gone and must not be reused.
    #[inline]
    pub fn is_connection_terminated(&self) -> bool {
        matches!(self, Self::ConnectionTerminated { .. })
    }

    #[inline]
    pub fn is_too_many_bytes(&self) -> bool {
        matches!(self, Self::TooManyBytes { .. })
    }
}

impl From<Infallible> for BodyError {
    fn from(e: Infallible) -> Self {
        match e {}
    }
}
