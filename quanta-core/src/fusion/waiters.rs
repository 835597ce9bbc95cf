//! The shared waiter list of a fusion.

use tokio::sync::oneshot;

/// Callers parked until the fusion first has a combined value.
#[derive(Debug, Default)]
pub(crate) struct Waiters {
    senders: Vec<oneshot::Sender<()>>,
}

impl Waiters {
    /// Park a new waiter.
    pub(crate) fn park(&mut self) -> oneshot::Receiver<()> {
        let (sender, receiver) = oneshot::channel();
        self.senders.push(sender);
        receiver
    }

    /// Take every parked waiter, leaving the list empty.
    pub(crate) fn take(&mut self) -> Waiters {
        std::mem::take(self)
    }

    /// Wake every waiter.
    pub(crate) fn free(self) {
        for sender in self.senders {
            // A dropped receiver just means nobody is waiting anymore.
            let _ = sender.send(());
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.senders.len()
    }
}
