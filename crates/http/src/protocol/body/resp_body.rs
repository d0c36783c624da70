use std::fmt;
use std::io::SeekFrom;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures::{StreamExt, TryStreamExt};
use http_body::{Body, Frame, SizeHint};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, BodyStream, StreamBody};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

use crate::protocol::BodyError;

/// The body-producing part of a response, consumed once when the response is written.
pub struct ResponseBody {
    inner: Kind,
}

enum Kind {
    Once(Option<Bytes>),
    Stream(UnsyncBoxBody<Bytes, BodyError>),
    File { send_file: SendFile, stream: UnsyncBoxBody<Bytes, BodyError> },
}

/// Describes a file (or a byte range of it) to be sent as the response body.
///
/// Transports able to use `sendfile` can read this descriptor through
/// [`ResponseBody::send_file`] and bypass the generic body stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendFile {
    path: PathBuf,
    range: Option<Range<u64>>,
}

impl SendFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The byte range to send, `start` inclusive and `end` exclusive. `None` sends the whole file.
    pub fn range(&self) -> Option<&Range<u64>> {
        self.range.as_ref()
    }

    /// The number of bytes to send, when it is known without touching the file.
    pub fn range_len(&self) -> Option<u64> {
        self.range.as_ref().map(|r| r.end.saturating_sub(r.start))
    }
}

impl ResponseBody {
    pub fn empty() -> Self {
        Self { inner: Kind::Once(None) }
    }

    pub fn once(bytes: Bytes) -> Self {
        Self { inner: Kind::Once(Some(bytes)) }
    }

    pub fn stream<B>(body: B) -> Self
    where
        B: Body<Data = Bytes, Error = BodyError> + Send + 'static,
    {
        Self { inner: Kind::Stream(UnsyncBoxBody::new(body)) }
    }

    /// A body streaming the file at `path`, or the `range` of it.
    ///
    /// The file is opened lazily, on the first poll.
    pub fn file(path: impl Into<PathBuf>, range: Option<Range<u64>>) -> Self {
        let send_file = SendFile { path: path.into(), range };
        let stream = file_stream(send_file.clone());
        Self { inner: Kind::File { send_file, stream } }
    }

    /// Returns the send-file descriptor if this body streams a file.
    pub fn send_file(&self) -> Option<&SendFile> {
        match &self.inner {
            Kind::File { send_file, .. } => Some(send_file),
            _ => None,
        }
    }

    /// Chains `next` after this body.
    ///
    /// Two in-memory bodies are concatenated eagerly; anything else becomes a stream
    /// that yields this body's frames followed by `next`'s.
    pub fn append(self, next: ResponseBody) -> ResponseBody {
        match (self.inner, next.inner) {
            (Kind::Once(None), other) | (other, Kind::Once(None)) => ResponseBody { inner: other },
            (Kind::Once(Some(first)), Kind::Once(Some(second))) => {
                let mut buf = BytesMut::with_capacity(first.len() + second.len());
                buf.extend_from_slice(&first);
                buf.extend_from_slice(&second);
                Self::once(buf.freeze())
            }
            (first, second) => {
                let first = BodyStream::new(ResponseBody { inner: first });
                let second = BodyStream::new(ResponseBody { inner: second });
                Self::stream(StreamBody::new(first.chain(second)))
            }
        }
    }

    /// Reads the whole body into memory.
    pub async fn into_bytes(self) -> Result<Bytes, BodyError> {
        Ok(self.collect().await?.to_bytes())
    }
}

fn file_stream(send_file: SendFile) -> UnsyncBoxBody<Bytes, BodyError> {
    let open = async move {
        let mut file = tokio::fs::File::open(&send_file.path).await?;
        let limit = match &send_file.range {
            Some(range) => {
                file.seek(SeekFrom::Start(range.start)).await?;
                range.end.saturating_sub(range.start)
            }
            None => u64::MAX,
        };
        Ok::<_, std::io::Error>(ReaderStream::new(file.take(limit)))
    };

    let frames = futures::stream::once(open).try_flatten().map_ok(Frame::data).map_err(BodyError::io);
    StreamBody::new(frames).boxed_unsync()
}

impl Default for ResponseBody {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Kind::Once(None) => f.write_str("ResponseBody::Empty"),
            Kind::Once(Some(bytes)) => f.debug_tuple("ResponseBody::Once").field(&bytes.len()).finish(),
            Kind::Stream(_) => f.write_str("ResponseBody::Stream"),
            Kind::File { send_file, .. } => f.debug_tuple("ResponseBody::File").field(send_file).finish(),
        }
    }
}

impl From<String> for ResponseBody {
    fn from(value: String) -> Self {
        if value.is_empty() { Self::empty() } else { Self::once(Bytes::from(value)) }
    }
}

impl From<()> for ResponseBody {
    fn from(_: ()) -> Self {
        Self::empty()
    }
}

impl From<Bytes> for ResponseBody {
    fn from(bytes: Bytes) -> Self {
        if bytes.is_empty() { Self::empty() } else { Self::once(bytes) }
    }
}

impl From<Vec<u8>> for ResponseBody {
    fn from(value: Vec<u8>) -> Self {
        Bytes::from(value).into()
    }
}

impl From<Option<Bytes>> for ResponseBody {
    fn from(option: Option<Bytes>) -> Self {
        match option {
            Some(bytes) => Self::once(bytes),
            None => Self::empty(),
        }
    }
}

impl From<&'static str> for ResponseBody {
    fn from(value: &'static str) -> Self {
        if value.is_empty() { Self::empty() } else { Self::once(Bytes::from_static(value.as_bytes())) }
    }
}

impl Body for ResponseBody {
    type Data = Bytes;
    type Error = BodyError;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match &mut self.get_mut().inner {
            Kind::Once(option_bytes) => Poll::Ready(option_bytes.take().map(|bytes| Ok(Frame::data(bytes)))),
            Kind::Stream(box_body) | Kind::File { stream: box_body, .. } => Pin::new(box_body).poll_frame(cx),
        }
    }

    fn is_end_stream(&self) -> bool {
        match &self.inner {
            Kind::Once(option_bytes) => option_bytes.is_none(),
            Kind::Stream(box_body) => box_body.is_end_stream(),
            Kind::File { .. } => false,
        }
    }

    fn size_hint(&self) -> SizeHint {
        match &self.inner {
            Kind::Once(None) => SizeHint::with_exact(0),
            Kind::Once(Some(bytes)) => SizeHint::with_exact(bytes.len() as u64),
            Kind::Stream(box_body) => box_body.size_hint(),
            Kind::File { send_file, .. } => send_file.range_len().map(SizeHint::with_exact).unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn check_send<T: Send>() {}

    #[test]
    fn is_send() {
        check_send::<ResponseBody>();
    }

    #[tokio::test]
    async fn test_string_body() {
        let s = "Hello world".to_string();
        let len = s.len() as u64;

        let mut body = ResponseBody::from(s);

        assert_eq!(body.size_hint().exact(), Some(len));
        assert!(!body.is_end_stream());

        let bytes = body.frame().await.unwrap().unwrap().into_data().unwrap();
        assert_eq!(bytes, Bytes::from("Hello world"));

        assert!(body.is_end_stream());
        assert!(body.frame().await.is_none());
    }

    #[tokio::test]
    async fn test_empty_body() {
        let mut body = ResponseBody::from("");

        assert!(body.is_end_stream());
        assert_eq!(body.size_hint().exact(), Some(0));

        assert!(body.frame().await.is_none());
    }

    #[tokio::test]
    async fn append_concatenates_in_memory_bodies() {
        let body = ResponseBody::from("foo").append(ResponseBody::from("bar"));
        assert_eq!(body.size_hint().exact(), Some(6));
        assert_eq!(body.into_bytes().await.unwrap(), Bytes::from_static(b"foobar"));
    }

    #[tokio::test]
    async fn append_chains_streams() {
        let chunks: Vec<Result<Frame<Bytes>, BodyError>> =
            vec![Ok(Frame::data(Bytes::from_static(b"1"))), Ok(Frame::data(Bytes::from_static(b"2")))];
        let stream = ResponseBody::stream(StreamBody::new(futures::stream::iter(chunks)));

        let body = ResponseBody::from("0").append(stream).append(ResponseBody::from("3"));
        assert!(body.size_hint().exact().is_none());
        assert_eq!(body.into_bytes().await.unwrap(), Bytes::from_static(b"0123"));
    }

    #[tokio::test]
    async fn file_body_reads_range() {
        let path = std::env::temp_dir().join(format!("micro-snap-resp-body-{}.txt", std::process::id()));
        std::fs::File::create(&path).unwrap().write_all(b"0123456789").unwrap();

        let body = ResponseBody::file(&path, Some(2..6));
        assert_eq!(body.send_file().unwrap().range_len(), Some(4));
        assert_eq!(body.size_hint().exact(), Some(4));
        assert_eq!(body.into_bytes().await.unwrap(), Bytes::from_static(b"2345"));

        let whole = ResponseBody::file(&path, None);
        assert_eq!(whole.into_bytes().await.unwrap(), Bytes::from_static(b"0123456789"));

        std::fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let body = ResponseBody::file("/definitely/not/here", None);
        assert!(matches!(body.into_bytes().await, Err(BodyError::Io { .. })));
    }
}
