use std::error::Error;
use std::fmt::Display;

use micro_snap_http::protocol::BodyError;
use thiserror::Error;

/// Faults raised while running a handler.
///
/// Declining and finishing early are not faults, they are [`Outcome`](crate::Outcome)
/// values. Everything here travels in the `Err` channel until a handler deals with it
/// or it reaches the caller of the driver.
#[derive(Error, Debug)]
pub enum SnapError {
    #[error("body error: {source}")]
    Body {
        #[from]
        source: BodyError,
    },

    #[error("conversion error: {source}")]
    Conversion {
        #[from]
        source: ConversionError,
    },

    #[error("no handler accepted the request")]
    NoHandler,

    #[error("the handler finished early without producing a value")]
    NoValue,

    #[error("request handling exceeded its deadline")]
    DeadlineExceeded,

    #[error(transparent)]
    Custom(Box<dyn Error + Send + Sync>),
}

impl SnapError {
    pub fn custom<E: Into<Box<dyn Error + Send + Sync>>>(e: E) -> Self {
        Self::Custom(e.into())
    }

    /// Returns true if the connection behind the request is gone.
    #[inline]
    pub fn is_connection_terminated(&self) -> bool {
        matches!(self, Self::Body { source } if source.is_connection_terminated())
    }

    #[inline]
    pub fn is_too_many_bytes(&self) -> bool {
        matches!(self, Self::Body { source } if source.is_too_many_bytes())
    }

    #[inline]
    pub fn is_conversion(&self) -> bool {
        matches!(self, Self::Conversion { .. })
    }
}

/// A value could not be parsed from its textual form.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot read {input:?} as {target}: {reason}")]
pub struct ConversionError {
    input: String,
    target: &'static str,
    reason: String,
}

impl ConversionError {
    pub fn new<R: Display>(input: &[u8], target: &'static str, reason: R) -> Self {
        Self { input: String::from_utf8_lossy(input).into_owned(), target, reason: reason.to_string() }
    }

    /// The rejected input, lossily decoded.
    pub fn input(&self) -> &str {
        &self.input
    }

    /// The name of the type the input was read as.
    pub fn target(&self) -> &'static str {
        self.target
    }
}
