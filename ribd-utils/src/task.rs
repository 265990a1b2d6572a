//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::Instrument;

/// Owned handle to a spawned task.
///
/// Dropping the handle aborts the task without waiting for it. Awaiting the
/// handle waits for the task to finish on its own, while [`Task::cancel`]
/// aborts it and waits until it's gone.
#[derive(Debug)]
pub struct Task<T> {
    handle: JoinHandle<T>,
}

/// One-shot timer. Dropping the handle disarms it.
#[derive(Debug)]
pub struct TimeoutTask {
    task: Task<()>,
    rearm_tx: mpsc::UnboundedSender<Option<Duration>>,
}

/// Periodic timer. Dropping the handle stops it.
#[derive(Debug)]
pub struct IntervalTask {
    task: Task<()>,
}

// ===== impl Task =====

impl<T> Task<T>
where
    T: Send + 'static,
{
    pub fn spawn<Fut>(future: Fut) -> Task<T>
    where
        Fut: Future<Output = T> + Send + 'static,
    {
        Task {
            handle: tokio::spawn(future),
        }
    }

    /// Aborts the task and waits until it has stopped running.
    ///
    /// Once this returns, the task can't produce side effects anymore.
    pub async fn cancel(self) {
        self.handle.abort();
        let _ = self.await;
    }
}

impl<T> Future for Task<T> {
    type Output = Result<T, JoinError>;

    fn poll(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Self::Output> {
        Pin::new(&mut self.handle).poll(cx)
    }
}

impl<T> Drop for Task<T> {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

// ===== impl TimeoutTask =====

impl TimeoutTask {
    /// Arms a timer that runs `cb` once `timeout` elapses.
    pub fn new<F, Fut>(timeout: Duration, cb: F) -> TimeoutTask
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let (rearm_tx, mut rearm_rx) = mpsc::unbounded_channel();
        let task = Task::spawn(
            async move {
                let mut timeout = timeout;
                let mut deadline = Instant::now() + timeout;
                loop {
                    tokio::select! {
                        _ = time::sleep_until(deadline) => break,
                        rearm = rearm_rx.recv() => {
                            // Handle dropped.
                            let Some(rearm): Option<Option<Duration>> = rearm else {
                                return;
                            };
                            timeout = rearm.unwrap_or(timeout);
                            deadline = Instant::now() + timeout;
                        }
                    }
                }
                cb().await;
            }
            .in_current_span(),
        );

        TimeoutTask { task, rearm_tx }
    }

    /// Pushes the deadline back, optionally with a new timeout value.
    ///
    /// Has no effect once the timer fired.
    pub fn reset(&mut self, timeout: Option<Duration>) {
        let _ = self.rearm_tx.send(timeout);
    }

    /// Disarms the timer and waits for its task to stop.
    pub async fn cancel(self) {
        self.task.cancel().await;
    }
}

// ===== impl IntervalTask =====

impl IntervalTask {
    /// Starts a timer that runs `cb` every `period`, the first time right
    /// away when `tick_on_start` is set.
    pub fn new<F, Fut>(
        period: Duration,
        tick_on_start: bool,
        mut cb: F,
    ) -> IntervalTask
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let task = Task::spawn(
            async move {
                let start = match tick_on_start {
                    true => Instant::now(),
                    false => Instant::now() + period,
                };
                let mut interval = time::interval_at(start, period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    interval.tick().await;
                    cb().await;
                }
            }
            .in_current_span(),
        );

        IntervalTask { task }
    }

    /// Stops the timer and waits for its task to stop.
    pub async fn cancel(self) {
        self.task.cancel().await;
    }
}

// ===== unit tests =====
