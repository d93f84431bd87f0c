use futures::{future::poll_fn, Future};
use std::{
    collections::HashSet,
    task::{ready, Context, Poll},
};
use tokio::task::{JoinError, JoinSet};

/// A collection of keyed tasks spawned on a Tokio runtime.
///
/// Each task returns a tuple of `(key, value)` so the key can be released when the task
/// completes. Dropping the map aborts every task still running in it, which makes it usable
/// as a supervised task group: whoever owns the map owns the lifetime of its children.
#[derive(Debug)]
pub struct JoinMap<K, V> {
    keys: HashSet<K>,
    joinset: JoinSet<(K, V)>,
}

impl<K, V> Default for JoinMap<K, V> {
    fn default() -> Self {
        Self { keys: HashSet::new(), joinset: JoinSet::new() }
    }
}

impl<K: 'static, V: 'static> JoinMap<K, V> {
    /// Create a new, empty `JoinMap`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of tasks currently in the map, including tasks that have completed
    /// but have not been joined yet.
    pub fn len(&self) -> usize {
        self.joinset.len()
    }

    /// Returns whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.joinset.is_empty()
    }

    /// Aborts all tasks in the map and forgets their keys. The aborted tasks are still
    /// returned by [`Self::join_next`] as cancelled [`JoinError`]s until they are reaped.
    pub fn abort_all(&mut self) {
        self.joinset.abort_all();
        self.keys.clear();
    }
}

impl<K, V> JoinMap<K, V>
where
    K: Eq + std::hash::Hash + Clone + Send + Sync + 'static,
    V: 'static,
{
    /// Spawns a task onto the Tokio runtime that will execute the given future ONLY IF
    /// there is not already a task in the map with the same key.
    ///
    /// Returns `true` if the task was spawned.
    pub fn spawn<F>(&mut self, key: K, future: F) -> bool
    where
        F: Future<Output = (K, V)> + Send + 'static,
        V: Send,
    {
        if self.keys.insert(key) {
            self.joinset.spawn(future);
            true
        } else {
            false
        }
    }

    /// Returns `true` if the map contains a running task for the given key.
    pub fn contains_key(&self, key: &K) -> bool {
        self.keys.contains(key)
    }

    /// Waits until one of the tasks in the map completes and returns its output.
    ///
    /// Returns `None` if the map is empty.
    ///
    /// # Cancel Safety
    ///
    /// This method is cancel safe. If `join_next` is used as the event in a `tokio::select!`
    /// statement and some other branch completes first, it is guaranteed that no tasks were
    /// removed from this `JoinMap`.
    pub async fn join_next(&mut self) -> Option<Result<(K, V), JoinError>> {
        poll_fn(|cx| self.poll_join_next(cx)).await
    }

    /// Polls for one of the tasks in the map to complete.
    ///
    /// If this returns `Poll::Ready(Some(_))`, then the task that completed is removed from the
    /// map.
    ///
    /// # Returns
    ///
    /// This function returns:
    ///
    ///  * `Poll::Pending` if the map is not empty but there is no task whose output is available
    ///    right now.
    ///  * `Poll::Ready(Some(Ok((key, value))))` if one of the tasks in this map has completed.
    ///  * `Poll::Ready(Some(Err(err)))` if one of the tasks in this map has panicked or been
    ///    aborted. A panicked task's key stays reserved, since the key is lost with the output.
    ///  * `Poll::Ready(None)` if the map is empty.
    pub fn poll_join_next(
        &mut self,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<(K, V), JoinError>>> {
        match ready!(self.joinset.poll_join_next(cx)) {
            Some(Ok((key, value))) => {
                self.keys.remove(&key);
                Poll::Ready(Some(Ok((key, value))))
            }
            Some(Err(err)) => Poll::Ready(Some(Err(err))),
            None => Poll::Ready(None),
        }
    }
}
