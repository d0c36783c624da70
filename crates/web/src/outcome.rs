use micro_snap_http::protocol::Response;

use crate::SnapError;

/// The result of running a handler.
#[derive(Debug)]
pub enum Outcome<V> {
    /// The handler does not apply to this request; the next alternative should run.
    Declined,
    /// Handling is finished and this response is final.
    Terminated(Response),
    /// The handler produced a value.
    Value(V),
}

/// What [`Handler::call`](crate::Handler::call) returns.
pub type SnapResult<T> = Result<Outcome<T>, SnapError>;

impl<V> Outcome<V> {
    #[inline]
    pub fn is_declined(&self) -> bool {
        matches!(self, Self::Declined)
    }

    #[inline]
    pub fn is_terminated(&self) -> bool {
        matches!(self, Self::Terminated(_))
    }

    #[inline]
    pub fn is_value(&self) -> bool {
        matches!(self, Self::Value(_))
    }

    pub fn map<U, F: FnOnce(V) -> U>(self, f: F) -> Outcome<U> {
        match self {
            Self::Declined => Outcome::Declined,
            Self::Terminated(response) => Outcome::Terminated(response),
            Self::Value(v) => Outcome::Value(f(v)),
        }
    }

    pub fn value(self) -> Option<V> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_response(self) -> Option<Response> {
        match self {
            Self::Terminated(response) => Some(response),
            _ => None,
        }
    }
}

/// Declines from inside a handler body: `return pass();`.
#[inline]
pub fn pass<T>() -> SnapResult<T> {
    Ok(Outcome::Declined)
}

/// Finishes handling from inside a handler body with `response` as the final response.
#[inline]
pub fn finish_with<T>(response: Response) -> SnapResult<T> {
    Ok(Outcome::Terminated(response))
}

/// Unwraps [`Outcome::Value`], returning early with `Declined` or `Terminated`.
///
/// The expression must be an `Outcome`; the enclosing function must return a
/// [`SnapResult`]. Combined with `?` this sequences handler steps left to right:
///
/// ```
/// use micro_snap::{outcome, Handler, Snap, SnapResult, Outcome};
///
/// async fn both<A, B>(a: &A, b: &B, snap: &mut Snap) -> SnapResult<(A::Output, B::Output)>
/// where
///     A: Handler,
///     B: Handler,
/// {
///     let first = outcome!(a.call(snap).await?);
///     let second = outcome!(b.call(snap).await?);
///     Ok(Outcome::Value((first, second)))
/// }
/// ```
#[macro_export]
macro_rules! outcome {
    ($outcome:expr) => {
        match $outcome {
            $crate::Outcome::Value(v) => v,
            $crate::Outcome::Declined => return Ok($crate::Outcome::Declined),
            $crate::Outcome::Terminated(response) => return Ok($crate::Outcome::Terminated(response)),
        }
    };
}
