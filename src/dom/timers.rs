use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};

#[derive(Debug, Error)]
pub enum TimerError {
    #[error("timers require a running tokio runtime")]
    NoRuntime,
}

/// Work to run on the owning thread once a timer fires. Actions receive the
/// registry so they can chain further timers.
pub type TimedAction = Box<dyn FnOnce(&TimerRegistry)>;

struct TimerEntry {
    action: TimedAction,
    task: JoinHandle<()>,
}

/// One-shot timers for the page's event loop.
///
/// Sleeping happens on tokio tasks which only report fired ids back; the
/// actions themselves stay on the thread that owns the document and run from
/// [`TimerRegistry::poll`].
pub struct TimerRegistry {
    handle: Handle,
    next_id: Cell<u32>,
    timers: RefCell<HashMap<u32, TimerEntry>>,
    fired_rx: RefCell<UnboundedReceiver<u32>>,
    fired_tx: UnboundedSender<u32>,
}

impl TimerRegistry {
    pub fn new() -> Result<Self, TimerError> {
        let handle = Handle::try_current().map_err(|_| TimerError::NoRuntime)?;
        let (fired_tx, fired_rx) = unbounded_channel();
        Ok(Self {
            handle,
            next_id: Cell::new(1),
            timers: RefCell::new(HashMap::new()),
            fired_rx: RefCell::new(fired_rx),
            fired_tx,
        })
    }

    fn next_id(&self) -> u32 {
        let id = self.next_id.get();
        self.next_id.set(id.wrapping_add(1).max(1));
        id
    }

    pub fn schedule(&self, delay: Duration, action: impl FnOnce(&TimerRegistry) + 'static) -> u32 {
        let id = self.next_id();
        let tx = self.fired_tx.clone();
        let task = self.handle.spawn(async move {
            sleep(delay).await;
            let _ = tx.send(id);
        });

        self.timers.borrow_mut().insert(
            id,
            TimerEntry {
                action: Box::new(action),
                task,
            },
        );
        id
    }

    pub fn clear(&self, id: u32) -> bool {
        match self.timers.borrow_mut().remove(&id) {
            Some(entry) => {
                entry.task.abort();
                true
            }
            None => false,
        }
    }

    /// Runs every action whose timer has fired and returns how many ran.
    pub fn poll(&self) -> usize {
        let mut executed = 0;
        loop {
            let fired = self.fired_rx.borrow_mut().try_recv();
            let Ok(id) = fired else {
                break;
            };
            let entry = self.timers.borrow_mut().remove(&id);
            if let Some(entry) = entry {
                (entry.action)(self);
                executed += 1;
            }
        }
        executed
    }

    pub fn pending(&self) -> usize {
        self.timers.borrow().len()
    }

    pub fn clear_all(&self) {
        let mut timers = self.timers.borrow_mut();
        for (_, entry) in timers.drain() {
            entry.task.abort();
        }
    }
}

impl Drop for TimerRegistry {
    fn drop(&mut self) {
        self.clear_all();
    }
}
