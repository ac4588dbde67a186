//! Scheduling of update cycles.
//!
//! The update loop asks its trigger for the next cycle and stops once the
//! trigger reports it is exhausted. The core update logic never touches the
//! terminal; [`LineTrigger`] is just one trigger among others.

use std::future::Future;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::mpsc;
use tokio::time::{Interval, MissedTickBehavior};

/// Decides when the next update cycle runs.
pub trait UpdateTrigger: Send {
    /// Waits for the next cycle. `false` ends the loop.
    fn next(&mut self) -> impl Future<Output = bool> + Send;
}

/// Shortest period an [`IntervalTrigger`] accepts.
pub const MIN_INTERVAL_PERIOD: Duration = Duration::from_millis(1);

/// Fires immediately, then once every period.
#[derive(Debug)]
pub struct IntervalTrigger {
    interval: Interval,
    remaining: Option<usize>,
}

impl IntervalTrigger {
    /// Fires forever. A zero period is raised to [`MIN_INTERVAL_PERIOD`].
    pub fn new(period: Duration) -> Self {
        let mut interval = tokio::time::interval(period.max(MIN_INTERVAL_PERIOD));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            interval,
            remaining: None,
        }
    }

    /// Fires at most `cycles` times.
    #[must_use]
    pub const fn limited(mut self, cycles: usize) -> Self {
        self.remaining = Some(cycles);
        self
    }
}

impl UpdateTrigger for IntervalTrigger {
    async fn next(&mut self) -> bool {
        match &mut self.remaining {
            Some(0) => return false,
            Some(n) => *n -= 1,
            None => {}
        }
        self.interval.tick().await;
        true
    }
}

/// Fires whenever its [`ManualTriggerHandle`] does; ends when all handles drop.
#[derive(Debug)]
pub struct ManualTrigger {
    rx: mpsc::Receiver<()>,
}

/// Sending side of a [`ManualTrigger`].
#[derive(Debug, Clone)]
pub struct ManualTriggerHandle {
    tx: mpsc::Sender<()>,
}

impl ManualTrigger {
    /// A trigger and its handle; up to `buffer` requests may queue.
    pub fn channel(buffer: usize) -> (ManualTriggerHandle, Self) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (
            ManualTriggerHandle {
                tx,
            },
            Self {
                rx,
            },
        )
    }
}

impl ManualTriggerHandle {
    /// Requests a cycle. Returns `false` if the trigger is gone.
    pub async fn fire(&self) -> bool {
        self.tx.send(()).await.is_ok()
    }
}

impl UpdateTrigger for ManualTrigger {
    async fn next(&mut self) -> bool {
        self.rx.recv().await.is_some()
    }
}

/// Runs a cycle at start and then once per input line.
///
/// Ends at end of input or on a line reading `q`, `quit` or `exit`.
#[derive(Debug)]
pub struct LineTrigger<R> {
    lines: Lines<R>,
    started: bool,
}

impl<R: AsyncBufRead + Unpin + Send> LineTrigger<R> {
    /// Trigger reading lines from `reader`.
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            started: false,
        }
    }
}

impl LineTrigger<BufReader<Stdin>> {
    /// Trigger reading lines from standard input.
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

impl<R: AsyncBufRead + Unpin + Send> UpdateTrigger for LineTrigger<R> {
    async fn next(&mut self) -> bool {
        if !self.started {
            self.started = true;
            return true;
        }
        match self.lines.next_line().await {
            Ok(Some(line)) => !matches!(line.trim(), "q" | "quit" | "exit"),
            Ok(None) => false,
            Err(e) => {
                tracing::warn!("Failed to read trigger input: {}", e);
                false
            }
        }
    }
}
