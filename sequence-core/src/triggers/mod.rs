//! Name-keyed trigger bus shared by the controller and its subscribers.
//!
//! Trigger names form a closed [`TriggerCatalog`] built before anything
//! subscribes. Components resolve names into typed [`Trigger`] handles once at
//! construction, so a misspelt name surfaces as a [`TriggerError`] instead of
//! a silently ignored publication.
//!
//! Publication is synchronous: every handler registered for a trigger runs
//! before [`TriggerBus::publish`] returns. Handlers may publish other triggers
//! or register new handlers while being dispatched.

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use core::fmt;

use heapless::HistoryBuf;
use thiserror::Error;
use tracing::{trace, warn};

use crate::sequence::SequenceConfig;

/// Number of publications retained in the bus journal.
pub const JOURNAL_CAPACITY: usize = 64;

/// Typed handle to a trigger name in a [`TriggerCatalog`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Trigger(usize);

impl Trigger {
    /// Position of the trigger in its catalog.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "trigger#{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TriggerError {
    #[error("unknown trigger `{0}`")]
    Unknown(String),
}

/// Closed set of trigger names known to a bus.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TriggerCatalog {
    names: Vec<String>,
}

impl TriggerCatalog {
    #[must_use]
    pub const fn new() -> Self {
        Self { names: Vec::new() }
    }

    /// Catalog holding every trigger name the sequence references.
    #[must_use]
    pub fn for_sequence(config: &SequenceConfig) -> Self {
        let mut catalog = Self::new();
        for name in config.trigger_names() {
            catalog.insert(name);
        }
        catalog
    }

    /// Adds extra names declared by the host.
    #[must_use]
    pub fn with_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            self.insert(name.as_ref());
        }
        self
    }

    /// Interns `name`, returning the existing handle for duplicates.
    pub fn insert(&mut self, name: &str) -> Trigger {
        if let Some(index) = self.position(name) {
            return Trigger(index);
        }
        self.names.push(name.to_string());
        Trigger(self.names.len() - 1)
    }

    /// Resolves a trigger name.
    ///
    /// # Errors
    ///
    /// Returns [`TriggerError::Unknown`] when the name is not in the catalog.
    pub fn resolve(&self, name: &str) -> Result<Trigger, TriggerError> {
        self.position(name)
            .map(Trigger)
            .ok_or_else(|| TriggerError::Unknown(name.to_string()))
    }

    /// Resolves an optional trigger name, passing `None` through.
    ///
    /// # Errors
    ///
    /// Returns [`TriggerError::Unknown`] when a name is present but unknown.
    pub fn resolve_optional(&self, name: Option<&str>) -> Result<Option<Trigger>, TriggerError> {
        name.map(|name| self.resolve(name)).transpose()
    }

    #[must_use]
    pub fn name(&self, trigger: Trigger) -> Option<&str> {
        self.names.get(trigger.0).map(String::as_str)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Trigger, &str)> {
        self.names
            .iter()
            .enumerate()
            .map(|(index, name)| (Trigger(index), name.as_str()))
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|known| known == name)
    }
}

/// Publication delivered to trigger handlers.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TriggerEvent<'a> {
    pub trigger: Trigger,
    pub name: &'a str,
    /// Monotonic publication counter, shared across all triggers.
    pub sequence: u32,
}

/// Journal entry describing a past publication.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TriggerRecord {
    pub sequence: u32,
    pub trigger: Trigger,
    /// Handlers registered when the publication started.
    pub handlers: usize,
}

type Handler = Rc<RefCell<Box<dyn FnMut(&TriggerEvent<'_>)>>>;

/// Synchronous publish/subscribe bus over a closed trigger catalog.
pub struct TriggerBus {
    catalog: TriggerCatalog,
    handlers: RefCell<Vec<Vec<Handler>>>,
    journal: RefCell<HistoryBuf<TriggerRecord, JOURNAL_CAPACITY>>,
    next_sequence: Cell<u32>,
}

impl TriggerBus {
    #[must_use]
    pub fn new(catalog: TriggerCatalog) -> Self {
        let handlers = (0..catalog.len()).map(|_| Vec::new()).collect();
        Self {
            catalog,
            handlers: RefCell::new(handlers),
            journal: RefCell::new(HistoryBuf::new()),
            next_sequence: Cell::new(0),
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &TriggerCatalog {
        &self.catalog
    }

    /// Resolves a trigger name against the bus catalog.
    ///
    /// # Errors
    ///
    /// Returns [`TriggerError::Unknown`] when the name is not in the catalog.
    pub fn resolve(&self, name: &str) -> Result<Trigger, TriggerError> {
        self.catalog.resolve(name)
    }

    /// Name of a trigger from this bus' catalog, or `"?"` for foreign handles.
    #[must_use]
    pub fn name(&self, trigger: Trigger) -> &str {
        self.catalog.name(trigger).unwrap_or("?")
    }

    /// Registers `handler` to run whenever `trigger` is published.
    ///
    /// Handlers run in registration order.
    pub fn subscribe<F>(&self, trigger: Trigger, handler: F)
    where
        F: FnMut(&TriggerEvent<'_>) + 'static,
    {
        let mut handlers = self.handlers.borrow_mut();
        let Some(slot) = handlers.get_mut(trigger.0) else {
            warn!(%trigger, "ignoring subscription to trigger outside the catalog");
            return;
        };
        let handler: Box<dyn FnMut(&TriggerEvent<'_>)> = Box::new(handler);
        slot.push(Rc::new(RefCell::new(handler)));
    }

    /// Resolves `name` and registers `handler` for it.
    ///
    /// # Errors
    ///
    /// Returns [`TriggerError::Unknown`] when the name is not in the catalog.
    pub fn subscribe_named<F>(&self, name: &str, handler: F) -> Result<Trigger, TriggerError>
    where
        F: FnMut(&TriggerEvent<'_>) + 'static,
    {
        let trigger = self.resolve(name)?;
        self.subscribe(trigger, handler);
        Ok(trigger)
    }

    /// Invokes every handler registered for `trigger` and returns how many ran.
    ///
    /// The handler list is captured before dispatch, so handlers registered
    /// during a publication first see the next one. A handler that publishes
    /// a trigger leading back to itself is skipped for the nested call.
    pub fn publish(&self, trigger: Trigger) -> usize {
        let Some(name) = self.catalog.name(trigger) else {
            warn!(%trigger, "dropping publication of trigger outside the catalog");
            return 0;
        };

        let snapshot: Vec<Handler> = self
            .handlers
            .borrow()
            .get(trigger.0)
            .cloned()
            .unwrap_or_default();

        let sequence = self.next_sequence.get();
        self.next_sequence.set(sequence.wrapping_add(1));
        self.journal.borrow_mut().write(TriggerRecord {
            sequence,
            trigger,
            handlers: snapshot.len(),
        });
        trace!(trigger = name, sequence, handlers = snapshot.len(), "publish");

        let event = TriggerEvent {
            trigger,
            name,
            sequence,
        };

        let mut invoked = 0;
        for handler in &snapshot {
            match handler.try_borrow_mut() {
                Ok(mut handler) => {
                    (*handler)(&event);
                    invoked += 1;
                }
                Err(_) => warn!(trigger = name, "skipping handler re-entered by its own trigger"),
            }
        }
        invoked
    }

    /// Resolves `name` and publishes it.
    ///
    /// # Errors
    ///
    /// Returns [`TriggerError::Unknown`] when the name is not in the catalog.
    pub fn publish_named(&self, name: &str) -> Result<usize, TriggerError> {
        let trigger = self.resolve(name)?;
        Ok(self.publish(trigger))
    }

    /// Publishes `trigger` when present; absent triggers are skipped silently.
    pub fn publish_optional(&self, trigger: Option<Trigger>) -> usize {
        trigger.map_or(0, |trigger| self.publish(trigger))
    }

    #[must_use]
    pub fn subscriber_count(&self, trigger: Trigger) -> usize {
        self.handlers.borrow().get(trigger.0).map_or(0, Vec::len)
    }

    /// Recent publications, oldest first.
    #[must_use]
    pub fn journal(&self) -> Vec<TriggerRecord> {
        self.journal.borrow().oldest_ordered().copied().collect()
    }

    /// Names of recent publications, oldest first.
    #[must_use]
    pub fn journal_names(&self) -> Vec<&str> {
        self.journal
            .borrow()
            .oldest_ordered()
            .map(|record| self.name(record.trigger))
            .collect()
    }

    /// Total number of publications since the bus was created.
    #[must_use]
    pub fn published(&self) -> u32 {
        self.next_sequence.get()
    }
}

impl fmt::Debug for TriggerBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TriggerBus")
            .field("catalog", &self.catalog)
            .field("published", &self.next_sequence.get())
            .finish_non_exhaustive()
    }
}
