//! Result helpers shared by every fallible stage.
//!
//! `WithError` is a plain `std::result::Result`; the free functions below give the
//! pipeline stages a uniform vocabulary for building and sequencing results.

use std::future::Future;

use crate::InsightError;

/// Outcome of a fallible operation: exactly one of a value or an error.
pub type WithError<T, E = InsightError> = std::result::Result<T, E>;

/// Wrap a value as a successful result.
pub fn success<T, E>(value: T) -> WithError<T, E> {
    Ok(value)
}

/// Wrap an error as a failed result.
pub fn error<T, E>(err: E) -> WithError<T, E> {
    Err(err)
}

/// Apply `f` to the value of a successful result. Errors pass through untouched
/// and `f` is never called for them.
pub fn map_result<T, U, E, F>(result: WithError<T, E>, f: F) -> WithError<U, E>
where
    F: FnOnce(T) -> U,
{
    match result {
        Ok(value) => Ok(f(value)),
        Err(err) => Err(err),
    }
}

/// Sequence two fallible steps. The second step only runs when the first succeeded.
pub fn flat_map_result<T, U, E, F>(result: WithError<T, E>, f: F) -> WithError<U, E>
where
    F: FnOnce(T) -> WithError<U, E>,
{
    match result {
        Ok(value) => f(value),
        Err(err) => Err(err),
    }
}

/// Async counterpart of [`flat_map_result`].
pub async fn flat_map_result_async<T, U, E, F, Fut>(result: WithError<T, E>, f: F) -> WithError<U, E>
where
    F: FnOnce(T) -> Fut,
    Fut: Future<Output = WithError<U, E>>,
{
    match result {
        Ok(value) => f(value).await,
        Err(err) => Err(err),
    }
}
