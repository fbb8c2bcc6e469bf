//! Bounded-concurrency task runner
//!
//! Runs one async job per input item with at most `limit` jobs outstanding,
//! returning results in input order regardless of completion order.

use std::future::Future;

use futures::stream::{FuturesUnordered, StreamExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundedTaskPool {
    limit: usize,
}

impl BoundedTaskPool {
    /// A limit of 0 is treated as 1.
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Run `work` over every item. See [`run_with_progress`](Self::run_with_progress).
    pub async fn run<I, T, E, F, Fut>(&self, items: I, work: F) -> Result<Vec<T>, E>
    where
        I: IntoIterator,
        F: FnMut(I::Item) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run_with_progress(items, work, |_, _| {}).await
    }

    /// Run `work` over every item, calling `on_progress(completed, total)`
    /// once per successfully completed item, in completion order.
    ///
    /// On the first failure no further items are started. Jobs already in
    /// flight are driven to completion before the first error is returned.
    pub async fn run_with_progress<I, T, E, F, Fut, P>(
        &self,
        items: I,
        mut work: F,
        mut on_progress: P,
    ) -> Result<Vec<T>, E>
    where
        I: IntoIterator,
        F: FnMut(I::Item) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: FnMut(usize, usize),
    {
        let items: Vec<I::Item> = items.into_iter().collect();
        let total = items.len();
        let mut slots: Vec<Option<T>> = Vec::with_capacity(total);
        slots.resize_with(total, || None);

        let mut pending = items.into_iter().enumerate();
        let mut in_flight = FuturesUnordered::new();
        let mut completed = 0;
        let mut first_error: Option<E> = None;

        loop {
            while first_error.is_none() && in_flight.len() < self.limit {
                let Some((index, item)) = pending.next() else {
                    break;
                };
                let job = work(item);
                in_flight.push(async move { (index, job.await) });
            }

            let Some((index, outcome)) = in_flight.next().await else {
                break;
            };

            match outcome {
                Ok(value) => {
                    slots[index] = Some(value);
                    completed += 1;
                    on_progress(completed, total);
                }
                Err(err) => {
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            // Every slot is filled when no job failed.
            None => Ok(slots.into_iter().flatten().collect()),
        }
    }
}

impl Default for BoundedTaskPool {
    fn default() -> Self {
        Self::new(8)
    }
}
