//! In-process event listener list.
//!
//! Listeners are named, carry an enabled flag and optionally a before-save
//! hook. Flag changes take effect only after [`EventListenerList::recompute_enabled`]
//! rebuilds the active set used when firing.

use chrono::{DateTime, Utc};
use tracing::trace;

use crate::error::Result;
use crate::listeners::dublincore::DublinCoreHook;
use crate::listeners::{DUBLINCORE_LISTENER, OP_CHAIN_LISTENER, OP_CHAIN_POSTCOMMIT_LISTENER};
use crate::model::Document;

/// What a hook knows about the save being performed.
#[derive(Debug, Clone, Copy)]
pub struct SaveContext<'a> {
    pub principal: &'a str,
    pub now: DateTime<Utc>,
    pub is_new: bool,
}

/// Mutates a document right before it is persisted.
pub trait BeforeSaveHook: Send {
    /// # Errors
    ///
    /// A failing hook aborts the save.
    fn before_save(&self, doc: &mut Document, ctx: &SaveContext<'_>) -> Result<()>;
}

/// One registered listener.
pub struct ListenerDescriptor {
    pub name: String,
    pub enabled: bool,
    hook: Option<Box<dyn BeforeSaveHook>>,
}

impl std::fmt::Debug for ListenerDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerDescriptor")
            .field("name", &self.name)
            .field("enabled", &self.enabled)
            .field("has_hook", &self.hook.is_some())
            .finish()
    }
}

/// Registered listeners in registration order plus the cached active set.
#[derive(Debug, Default)]
pub struct EventListenerList {
    descriptors: Vec<ListenerDescriptor>,
    active: Vec<usize>,
}

impl EventListenerList {
    /// The three listeners a demo repository ships with, all enabled.
    ///
    /// Only the dublincore listener has a hook; the operation-chain
    /// listeners are registered so they can be toggled.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut list = Self::default();
        list.register(DUBLINCORE_LISTENER, true, Some(Box::new(DublinCoreHook)));
        list.register(OP_CHAIN_LISTENER, true, None);
        list.register(OP_CHAIN_POSTCOMMIT_LISTENER, true, None);
        list.recompute_enabled();
        list
    }

    /// Register or replace a listener. The active set is not recomputed.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        enabled: bool,
        hook: Option<Box<dyn BeforeSaveHook>>,
    ) {
        let name = name.into();
        let descriptor = ListenerDescriptor {
            name: name.clone(),
            enabled,
            hook,
        };
        match self.descriptors.iter_mut().find(|d| d.name == name) {
            Some(existing) => *existing = descriptor,
            None => self.descriptors.push(descriptor),
        }
    }

    #[must_use]
    pub fn is_enabled(&self, name: &str) -> Option<bool> {
        self.descriptors
            .iter()
            .find(|d| d.name == name)
            .map(|d| d.enabled)
    }

    /// Returns `false` when no listener has that name.
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> bool {
        match self.descriptors.iter_mut().find(|d| d.name == name) {
            Some(descriptor) => {
                descriptor.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn recompute_enabled(&mut self) {
        self.active = self
            .descriptors
            .iter()
            .enumerate()
            .filter(|(_, d)| d.enabled)
            .map(|(i, _)| i)
            .collect();
    }

    /// Names of listeners that fire on save.
    #[must_use]
    pub fn active_names(&self) -> Vec<&str> {
        self.active
            .iter()
            .map(|&i| self.descriptors[i].name.as_str())
            .collect()
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &ListenerDescriptor> {
        self.descriptors.iter()
    }

    /// Run every active hook against `doc`.
    ///
    /// # Errors
    ///
    /// Stops at and returns the first hook failure.
    pub fn fire_before_save(&self, doc: &mut Document, ctx: &SaveContext<'_>) -> Result<()> {
        for &index in &self.active {
            let descriptor = &self.descriptors[index];
            if let Some(hook) = &descriptor.hook {
                trace!(listener = %descriptor.name, doc_id = %doc.id, "firing before-save hook");
                hook.before_save(doc, ctx)?;
            }
        }
        Ok(())
    }
}
