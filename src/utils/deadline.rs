use std::future::Future;

use futures::{stream::FuturesUnordered, StreamExt};
use tokio::time::{self, Instant};

/// Drives `futures` concurrently until `wanted` of them have produced a
/// value or `deadline` passes, whichever comes first.
///
/// A future resolving to `None` counts as failed. The returned values carry
/// the index of the future that produced them, in completion order. Futures
/// still pending when this returns are dropped.
pub async fn first_n_until<F, T>(
    futures: Vec<F>,
    wanted: usize,
    deadline: Instant,
) -> Vec<(usize, T)>
where
    F: Future<Output = Option<T>>,
{
    let mut pending: FuturesUnordered<_> = futures
        .into_iter()
        .enumerate()
        .map(|(index, future)| async move { (index, future.await) })
        .collect();

    let expired = time::sleep_until(deadline);
    tokio::pin!(expired);

    let mut done = Vec::with_capacity(wanted);
    while done.len() < wanted {
        tokio::select! {
            next = pending.next() => match next {
                Some((index, Some(value))) => done.push((index, value)),
                Some((_, None)) => {}
                None => break,
            },
            _ = &mut expired => break,
        }
    }
    done
}

/// `None` when `future` does not finish before `deadline`.
pub async fn until<F, T>(deadline: Instant, future: F) -> Option<T>
where
    F: Future<Output = T>,
{
    time::timeout_at(deadline, future).await.ok()
}
