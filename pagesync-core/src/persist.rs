//! Fire-and-forget persistence of the current page.
//!
//! Writes are spawned on the ambient tokio runtime and may complete in any
//! order. Each write carries a per-document generation so that, with a
//! debounce configured, a write superseded while waiting is dropped and the
//! last requested page wins.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::remote::PageUpdater;
use crate::{DocumentId, EventLog, SessionEvent};

pub struct PagePersister {
    updater: Arc<dyn PageUpdater>,
    debounce: Duration,
    generations: Arc<Mutex<HashMap<DocumentId, u64>>>,
    in_flight: Mutex<Vec<JoinHandle<()>>>,
    events: EventLog,
}

impl PagePersister {
    pub fn new(updater: Arc<dyn PageUpdater>, debounce: Duration, events: EventLog) -> Self {
        Self {
            updater,
            debounce,
            generations: Arc::new(Mutex::new(HashMap::new())),
            in_flight: Mutex::new(Vec::new()),
            events,
        }
    }

    pub fn persist(&self, document: &str, page: u32) {
        let generation = {
            let mut generations = self.generations.lock();
            let entry = generations.entry(document.to_owned()).or_insert(0);
            *entry += 1;
            *entry
        };

        let Ok(runtime) = Handle::try_current() else {
            warn!(document, page, "no async runtime available, page not persisted");
            self.events.lock().push(SessionEvent::PersistFailed {
                document: document.to_owned(),
                page,
                reason: "no async runtime available".to_owned(),
            });
            return;
        };

        let write = PendingWrite {
            document: document.to_owned(),
            page,
            generation,
            debounce: self.debounce,
            updater: Arc::clone(&self.updater),
            generations: Arc::clone(&self.generations),
            events: Arc::clone(&self.events),
        };
        let handle = runtime.spawn(write.run());

        let mut in_flight = self.in_flight.lock();
        in_flight.retain(|task| !task.is_finished());
        in_flight.push(handle);
    }

    /// Waits for every write issued so far.
    pub async fn flush(&self) {
        let pending = std::mem::take(&mut *self.in_flight.lock());
        for task in pending {
            if let Err(err) = task.await {
                warn!(?err, "page persistence task did not complete");
            }
        }
    }
}

struct PendingWrite {
    document: DocumentId,
    page: u32,
    generation: u64,
    debounce: Duration,
    updater: Arc<dyn PageUpdater>,
    generations: Arc<Mutex<HashMap<DocumentId, u64>>>,
    events: EventLog,
}

impl PendingWrite {
    async fn run(self) {
        if !self.debounce.is_zero() {
            tokio::time::sleep(self.debounce).await;
            if self.is_superseded() {
                debug!(
                    document = %self.document,
                    page = self.page,
                    "skipping superseded page write"
                );
                return;
            }
        }

        let event = match self.updater.update_page(&self.document, self.page).await {
            Ok(()) => {
                debug!(document = %self.document, page = self.page, "page persisted");
                SessionEvent::PagePersisted {
                    document: self.document,
                    page: self.page,
                }
            }
            Err(err) => {
                warn!(
                    document = %self.document,
                    page = self.page,
                    "failed to persist current page: {err:#}"
                );
                SessionEvent::PersistFailed {
                    document: self.document,
                    page: self.page,
                    reason: format!("{err:#}"),
                }
            }
        };
        self.events.lock().push(event);
    }

    fn is_superseded(&self) -> bool {
        self.generations
            .lock()
            .get(&self.document)
            .is_some_and(|latest| *latest != self.generation)
    }
}
