//! Draining walk streams in tests.

use futures::StreamExt;
use futures_core::Stream;

/// Collect `stream`, stopping early after `limit` items so a broken walk
/// cannot hang the test.
pub async fn drain<S, T, E>(stream: S, limit: usize) -> Vec<Result<T, E>>
where
    S: Stream<Item = Result<T, E>> + Unpin,
{
    stream.take(limit).collect().await
}
