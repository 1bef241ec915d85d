//! Background work whose results come back as events on the driving thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::Sender;
use std::thread;

/// Runs blocking work on worker threads and queues each result, converted
/// into an event, to the driving thread's channel.
///
/// After [`close`](Self::close) no new work starts and finished work is
/// dropped instead of queued.
pub struct TaskRunner<E> {
    tx: Sender<E>,
    closing: Arc<AtomicBool>,
    in_flight: Arc<AtomicUsize>,
}

impl<E: Send + 'static> TaskRunner<E> {
    pub fn new(tx: Sender<E>) -> Self {
        Self {
            tx,
            closing: Arc::new(AtomicBool::new(false)),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn run<T, W, F>(&self, work: W, into_event: F)
    where
        T: Send + 'static,
        W: FnOnce() -> T + Send + 'static,
        F: FnOnce(T) -> E + Send + 'static,
    {
        if self.is_closing() {
            tracing::debug!("task runner closing, work not started");
            return;
        }

        let tx = self.tx.clone();
        let closing = Arc::clone(&self.closing);
        let in_flight = Arc::clone(&self.in_flight);
        in_flight.fetch_add(1, Ordering::SeqCst);

        thread::spawn(move || {
            let result = work();
            in_flight.fetch_sub(1, Ordering::SeqCst);
            if closing.load(Ordering::SeqCst) {
                return;
            }
            // Receiver gone means the driving loop exited.
            let _ = tx.send(into_event(result));
        });
    }

    pub fn close(&self) {
        self.closing.store(true, Ordering::SeqCst);
    }

    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::SeqCst)
    }

    /// Number of tasks started and not yet finished.
    pub fn pending(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Filter for events received from the channel: `None` once closed.
    pub fn accept(&self, event: E) -> Option<E> {
        (!self.is_closing()).then_some(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    #[derive(Debug, PartialEq)]
    enum Event {
        Done(u32),
    }

    #[test]
    fn result_is_delivered_as_event() {
        let (tx, rx) = mpsc::channel();
        let runner = TaskRunner::new(tx);

        runner.run(|| 20 + 22, Event::Done);

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), Event::Done(42));
        assert_eq!(runner.pending(), 0);
    }

    #[test]
    fn pending_counts_running_tasks() {
        let (tx, rx) = mpsc::channel();
        let runner = TaskRunner::new(tx);
        let (release_tx, release_rx) = mpsc::channel::<()>();

        runner.run(
            move || {
                let _ = release_rx.recv();
                1
            },
            Event::Done,
        );
        assert_eq!(runner.pending(), 1);

        release_tx.send(()).unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), Event::Done(1));
    }

    #[test]
    fn completions_after_close_are_discarded() {
        let (tx, rx) = mpsc::channel();
        let runner = TaskRunner::new(tx);
        let (release_tx, release_rx) = mpsc::channel::<()>();

        runner.run(
            move || {
                let _ = release_rx.recv();
                7
            },
            Event::Done,
        );
        runner.close();
        release_tx.send(()).unwrap();

        assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());
        assert_eq!(runner.accept(Event::Done(1)), None);
    }

    #[test]
    fn run_after_close_does_nothing() {
        let (tx, rx) = mpsc::channel();
        let runner = TaskRunner::new(tx);
        runner.close();

        runner.run(|| 1, Event::Done);

        assert_eq!(runner.pending(), 0);
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }
}
