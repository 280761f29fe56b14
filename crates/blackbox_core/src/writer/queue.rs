//! Task queue between callers and the writer thread.

use crate::file::WrittenCounts;
use crate::identifier::Identifier;
use crate::record::Record;
use crate::stamp::Stamp;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::Duration;

/// A record accepted by [`Writer`](super::Writer) and not yet written.
#[derive(Debug)]
pub(crate) struct Task {
    pub(crate) stamp: Stamp,
    pub(crate) id: Identifier,
    pub(crate) record: Record,
}

#[derive(Debug)]
pub(crate) enum Command {
    Write(Task),
    /// Answered once every earlier command is processed and the cache is on disk.
    Flush(mpsc::Sender<()>),
}

impl Command {
    fn weight(&self) -> usize {
        match self {
            Self::Write(task) => task.record.weight(),
            Self::Flush(_) => 0,
        }
    }
}

/// What the writer thread should do next.
#[derive(Debug)]
pub(crate) enum Next {
    Run(Command),
    Idle,
    Stop,
}

#[derive(Debug, Default)]
struct Pending {
    commands: VecDeque<Command>,
    weight: usize,
    shutdown: bool,
}

/// State shared by a writer handle and its thread.
#[derive(Debug, Default)]
pub(crate) struct Shared {
    pending: Mutex<Pending>,
    /// Signalled when a command is queued or shutdown is requested.
    queued: Condvar,
    /// Signalled when a command leaves the queue.
    drained: Condvar,
    dead: AtomicBool,
    error: Mutex<Option<String>>,
    pub(crate) counts: Mutex<WrittenCounts>,
}

impl Shared {
    pub(crate) fn is_dead(&self) -> bool {
        self.dead.load(Ordering::Acquire)
    }

    pub(crate) fn last_error(&self) -> Option<String> {
        self.error.lock().clone()
    }

    /// Queues a write, blocking while the queue is over `cap`.
    ///
    /// Returns false if the writer died or shut down meanwhile.
    pub(crate) fn push_write(&self, task: Task, cap: usize) -> bool {
        let command = Command::Write(task);
        let weight = command.weight();

        let mut pending = self.pending.lock();
        while pending.weight >= cap && !pending.commands.is_empty() && !self.is_dead() {
            self.drained.wait(&mut pending);
        }
        if self.is_dead() || pending.shutdown {
            return false;
        }
        pending.weight += weight;
        pending.commands.push_back(command);
        self.queued.notify_one();
        true
    }

    /// Queues a flush request; `None` once shut down.
    pub(crate) fn push_flush(&self) -> Option<mpsc::Receiver<()>> {
        let (ack, done) = mpsc::channel();
        let mut pending = self.pending.lock();
        if pending.shutdown {
            return None;
        }
        pending.commands.push_back(Command::Flush(ack));
        self.queued.notify_one();
        Some(done)
    }

    /// Takes the next command, waiting up to `tick` for one.
    pub(crate) fn next(&self, tick: Duration) -> Next {
        let mut pending = self.pending.lock();
        if pending.commands.is_empty() && !pending.shutdown {
            let _ = self.queued.wait_for(&mut pending, tick);
        }
        let next = match pending.commands.pop_front() {
            Some(command) => {
                pending.weight -= command.weight();
                Next::Run(command)
            }
            None if pending.shutdown => Next::Stop,
            None => Next::Idle,
        };
        drop(pending);
        self.drained.notify_all();
        next
    }

    /// Asks the thread to finish the queue and stop.
    pub(crate) fn shutdown(&self) {
        self.pending.lock().shutdown = true;
        self.queued.notify_all();
        self.drained.notify_all();
    }

    /// Marks the writer dead and drops queued writes.
    ///
    /// Queued flush requests are answered so no caller waits forever.
    pub(crate) fn die(&self, message: String) {
        tracing::warn!(error = %message, "writer failed, no further records accepted");
        self.error.lock().get_or_insert(message);
        self.dead.store(true, Ordering::Release);

        let mut pending = self.pending.lock();
        for command in pending.commands.drain(..) {
            if let Command::Flush(ack) = command {
                let _ = ack.send(());
            }
        }
        pending.weight = 0;
        drop(pending);
        self.drained.notify_all();
    }
}
