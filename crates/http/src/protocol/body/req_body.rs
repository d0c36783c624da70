use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use http_body::{Body, Frame, SizeHint};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full, StreamBody};

use crate::protocol::body::LimitedBody;
use crate::protocol::BodyError;

/// The readable source of a request body.
///
/// A `RequestBody` is in one of three states:
/// - an unread stream of bytes coming from the transport
/// - the empty source, which is what a body looks like once it has been consumed
/// - the failed source, which a body becomes once its connection is known to be gone;
///   every read of a failed source returns [`BodyError::ConnectionTerminated`]
///
/// It implements [`http_body::Body`], so any body combinator from `http-body-util`
/// can be used on it directly.
pub struct RequestBody {
    kind: Kind,
}

enum Kind {
    Stream(UnsyncBoxBody<Bytes, BodyError>),
    Empty,
    Failed { reason: String },
}

impl RequestBody {
    /// A body with no bytes.
    pub fn empty() -> Self {
        Self { kind: Kind::Empty }
    }

    /// A body that fails every read as a terminated connection.
    pub fn failed<S: ToString>(reason: S) -> Self {
        Self { kind: Kind::Failed { reason: reason.to_string() } }
    }

    /// Wraps any `http_body::Body` producing `Bytes`.
    pub fn from_body<B>(body: B) -> Self
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BodyError>,
    {
        Self { kind: Kind::Stream(body.map_err(Into::<BodyError>::into).boxed_unsync()) }
    }

    /// Wraps a stream of byte chunks.
    pub fn from_stream<S, E>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: Into<BodyError> + 'static,
    {
        let frames = stream.map(|item| item.map(Frame::data).map_err(Into::<BodyError>::into));
        Self::from_body(StreamBody::new(frames))
    }

    /// Returns true if this is the empty source.
    #[inline]
    pub fn is_spent(&self) -> bool {
        matches!(self.kind, Kind::Empty)
    }

    /// Returns true if this is the failed source.
    #[inline]
    pub fn is_failed(&self) -> bool {
        matches!(self.kind, Kind::Failed { .. })
    }

    /// Reads the next data chunk, skipping trailers.
    ///
    /// Returns `None` at end of stream.
    pub async fn chunk(&mut self) -> Option<Result<Bytes, BodyError>> {
        loop {
            match self.frame().await? {
                Ok(frame) => {
                    if let Ok(data) = frame.into_data() {
                        return Some(Ok(data));
                    }
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }

    /// Discards everything up to end of stream, returning the number of bytes skipped.
    pub async fn skip_to_eof(&mut self) -> Result<u64, BodyError> {
        let mut skipped: u64 = 0;
        while let Some(chunk) = self.chunk().await {
            skipped += chunk?.len() as u64;
        }
        Ok(skipped)
    }

    /// Reads everything up to end of stream into one buffer.
    pub async fn read_to_end(&mut self) -> Result<Bytes, BodyError> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = self.chunk().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(buf.freeze())
    }

    /// Borrows this body through a byte counting limiter.
    ///
    /// Reads through the returned body fail with [`BodyError::TooManyBytes`] as soon
    /// as more than `limit` bytes have been seen. Bytes the limiter did not read stay
    /// in this body.
    pub fn limit(&mut self, limit: u64) -> LimitedBody<&mut Self> {
        LimitedBody::new(self, limit)
    }
}

impl Default for RequestBody {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            Kind::Stream(_) => f.write_str("RequestBody::Stream"),
            Kind::Empty => f.write_str("RequestBody::Empty"),
            Kind::Failed { reason } => f.debug_struct("RequestBody::Failed").field("reason", reason).finish(),
        }
    }
}

impl Body for RequestBody {
    type Data = Bytes;
    type Error = BodyError;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match &mut self.get_mut().kind {
            Kind::Stream(body) => Pin::new(body).poll_frame(cx),
            Kind::Empty => Poll::Ready(None),
            Kind::Failed { reason } => Poll::Ready(Some(Err(BodyError::connection_terminated(reason.as_str())))),
        }
    }

    fn is_end_stream(&self) -> bool {
        match &self.kind {
            Kind::Stream(body) => body.is_end_stream(),
            Kind::Empty => true,
            Kind::Failed { .. } => false,
        }
    }

    fn size_hint(&self) -> SizeHint {
        match &self.kind {
            Kind::Stream(body) => body.size_hint(),
            Kind::Empty => SizeHint::with_exact(0),
            Kind::Failed { .. } => SizeHint::default(),
        }
    }
}

impl From<()> for RequestBody {
    fn from(_: ()) -> Self {
        Self::empty()
    }
}

impl From<Bytes> for RequestBody {
    fn from(bytes: Bytes) -> Self {
        if bytes.is_empty() {
            Self::empty()
        } else {
            Self::from_body(Full::new(bytes))
        }
    }
}

impl From<&'static str> for RequestBody {
    fn from(value: &'static str) -> Self {
        Bytes::from_static(value.as_bytes()).into()
    }
}

impl From<String> for RequestBody {
    fn from(value: String) -> Self {
        Bytes::from(value).into()
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(value: Vec<u8>) -> Self {
        Bytes::from(value).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn chunked(chunks: &[&'static str]) -> RequestBody {
        let items: Vec<Result<Bytes, io::Error>> = chunks.iter().map(|c| Ok(Bytes::from_static(c.as_bytes()))).collect();
        RequestBody::from_stream(futures::stream::iter(items))
    }

    #[tokio::test]
    async fn read_to_end_collects_all_chunks() {
        let mut body = chunked(&["hello", " ", "world"]);
        assert_eq!(body.read_to_end().await.unwrap(), Bytes::from_static(b"hello world"));
        assert!(body.chunk().await.is_none());
    }

    #[tokio::test]
    async fn skip_to_eof_counts_bytes() {
        let mut body = chunked(&["abc", "de"]);
        assert_eq!(body.chunk().await.unwrap().unwrap(), Bytes::from_static(b"abc"));
        assert_eq!(body.skip_to_eof().await.unwrap(), 2);
        assert_eq!(body.skip_to_eof().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn failed_body_reports_connection_terminated() {
        let mut body = RequestBody::failed("peer reset");
        assert!(body.is_failed());
        let err = body.read_to_end().await.unwrap_err();
        assert!(err.is_connection_terminated());
        // still failing on the next read
        assert!(body.chunk().await.unwrap().unwrap_err().is_connection_terminated());
    }

    #[tokio::test]
    async fn stream_errors_are_converted() {
        let items: Vec<Result<Bytes, io::Error>> =
            vec![Ok(Bytes::from_static(b"a")), Err(io::Error::new(io::ErrorKind::BrokenPipe, "broken"))];
        let mut body = RequestBody::from_stream(futures::stream::iter(items));
        assert!(matches!(body.read_to_end().await, Err(BodyError::Io { .. })));
    }

    #[test]
    fn empty_conversions() {
        assert!(RequestBody::from(()).is_spent());
        assert!(RequestBody::from("").is_spent());
        assert!(!RequestBody::from("x").is_end_stream());
        assert_eq!(RequestBody::from("abc").size_hint().exact(), Some(3));
    }
}
