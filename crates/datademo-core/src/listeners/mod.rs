//! Temporary listener suspension.
//!
//! Bulk mutators switch off side-effecting listeners (auto-timestamping in
//! particular) for the duration of a run. [`ListenerSuspension`] snapshots
//! the enabled flag of every registered name, disables them, and on restore
//! puts back exactly what was captured, including listeners that were
//! already disabled before the run.

pub mod dublincore;
pub mod registry;

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::error::{CoreError, Result};
use crate::session::ListenerRegistry;

pub use registry::{BeforeSaveHook, EventListenerList, ListenerDescriptor, SaveContext};

/// Dublin Core auto-timestamp listener.
pub const DUBLINCORE_LISTENER: &str = "dclistener";
/// Operation-chain listener.
pub const OP_CHAIN_LISTENER: &str = "opchainlistener";
/// Post-commit operation-chain listener.
pub const OP_CHAIN_POSTCOMMIT_LISTENER: &str = "opchainpclistener";

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    Idle,
    /// Registered name → flag at suspend time.
    Suspended(BTreeMap<String, bool>),
}

/// Suspends a set of listeners and restores their captured state.
#[derive(Debug)]
pub struct ListenerSuspension<'r, R> {
    registry: &'r R,
    names: Vec<String>,
    state: State,
}

impl<'r, R: ListenerRegistry> ListenerSuspension<'r, R> {
    #[must_use]
    pub const fn new(registry: &'r R) -> Self {
        Self {
            registry,
            names: Vec::new(),
            state: State::Idle,
        }
    }

    /// Add a listener to the suspension set. Blank names and names the
    /// registry does not know are rejected with a warning; duplicates are
    /// ignored. A failed lookup keeps the name and leaves the check to
    /// [`ListenerSuspension::suspend`].
    pub fn add_listener(&mut self, name: &str) -> &mut Self {
        let name = name.trim();
        if name.is_empty() {
            warn!("ignoring blank listener name");
            return self;
        }
        if self.names.iter().any(|n| n == name) {
            return self;
        }
        match self.registry.is_registered(name) {
            Ok(true) => self.names.push(name.to_string()),
            Ok(false) => warn!(listener = %name, "listener not registered, ignoring it"),
            Err(err) => {
                warn!(listener = %name, error = %err, "listener lookup failed");
                self.names.push(name.to_string());
            }
        }
        self
    }

    pub fn add_listeners<I, T>(&mut self, names: I) -> &mut Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        for name in names {
            self.add_listener(name.as_ref());
        }
        self
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub const fn is_suspended(&self) -> bool {
        matches!(self.state, State::Suspended(_))
    }

    /// Snapshot and disable every registered listener in the set. Names
    /// unregistered since they were added are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ListenersAlreadySuspended`] on a second call
    /// without an intervening restore, or any registry failure.
    pub fn suspend(&mut self) -> Result<()> {
        if self.is_suspended() {
            return Err(CoreError::ListenersAlreadySuspended);
        }

        let mut snapshot = BTreeMap::new();
        for name in &self.names {
            match self.registry.is_enabled(name)? {
                Some(enabled) => {
                    snapshot.insert(name.clone(), enabled);
                    self.registry.set_enabled(name, false)?;
                }
                None => warn!(listener = %name, "listener not registered, not suspending it"),
            }
        }
        self.registry.recompute_enabled()?;

        debug!(listeners = ?snapshot.keys().collect::<Vec<_>>(), "listeners suspended");
        self.state = State::Suspended(snapshot);
        Ok(())
    }

    /// Put every captured flag back and return to idle.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ListenersNotSuspended`] when nothing is
    /// suspended, or any registry failure.
    pub fn restore(&mut self) -> Result<()> {
        let State::Suspended(snapshot) = &self.state else {
            return Err(CoreError::ListenersNotSuspended);
        };

        for (name, enabled) in snapshot {
            self.registry.set_enabled(name, *enabled)?;
        }
        self.registry.recompute_enabled()?;

        debug!(count = snapshot.len(), "listeners restored");
        self.state = State::Idle;
        Ok(())
    }

    /// Forget registrations and any snapshot without touching the registry.
    pub fn reset(&mut self) {
        self.names.clear();
        self.state = State::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryStore;

    #[test]
    fn restore_returns_each_listener_to_its_snapshot() {
        let store = MemoryStore::default();
        store.register_listener("A", true);
        store.register_listener("B", false);

        let mut suspension = ListenerSuspension::new(&store);
        suspension.add_listeners(["A", "B"]);
        suspension.suspend().expect("suspend");
        assert_eq!(store.is_enabled("A").expect("A"), Some(false));
        assert_eq!(store.is_enabled("B").expect("B"), Some(false));

        suspension.restore().expect("restore");
        assert_eq!(store.is_enabled("A").expect("A"), Some(true));
        assert_eq!(store.is_enabled("B").expect("B"), Some(false));
        assert!(!suspension.is_suspended());
    }

    #[test]
    fn suspend_recomputes_once() {
        let store = MemoryStore::default();
        let mut suspension = ListenerSuspension::new(&store);
        suspension.add_listeners([DUBLINCORE_LISTENER, OP_CHAIN_LISTENER]);
        suspension.suspend().expect("suspend");
        assert_eq!(store.recompute_count(), 1);
        assert!(!store.active_listeners().contains(&DUBLINCORE_LISTENER.to_string()));
    }

    #[test]
    fn blank_and_duplicate_names_are_ignored() {
        let store = MemoryStore::default();
        let mut suspension = ListenerSuspension::new(&store);
        suspension
            .add_listener("  ")
            .add_listener(DUBLINCORE_LISTENER)
            .add_listener(DUBLINCORE_LISTENER);
        assert_eq!(suspension.names(), [DUBLINCORE_LISTENER]);
    }

    #[test]
    fn unknown_listener_is_rejected_when_added() {
        let store = MemoryStore::default();
        let mut suspension = ListenerSuspension::new(&store);
        suspension.add_listeners(["ghost", DUBLINCORE_LISTENER]);
        assert_eq!(suspension.names(), [DUBLINCORE_LISTENER]);
        suspension.suspend().expect("suspend");
        suspension.restore().expect("restore");

        assert_eq!(store.is_enabled("ghost").expect("lookup"), None);
        assert_eq!(store.set_enabled_calls(), 2);
    }

    #[test]
    fn misuse_is_a_state_violation() {
        let store = MemoryStore::default();
        let mut suspension = ListenerSuspension::new(&store);
        suspension.add_listener(DUBLINCORE_LISTENER);

        assert!(matches!(
            suspension.restore(),
            Err(CoreError::ListenersNotSuspended)
        ));
        suspension.suspend().expect("suspend");
        assert!(matches!(
            suspension.suspend(),
            Err(CoreError::ListenersAlreadySuspended)
        ));
    }

    #[test]
    fn reset_drops_names_and_snapshot() {
        let store = MemoryStore::default();
        let mut suspension = ListenerSuspension::new(&store);
        suspension.add_listener(DUBLINCORE_LISTENER);
        suspension.suspend().expect("suspend");
        suspension.reset();

        assert!(suspension.names().is_empty());
        assert!(matches!(
            suspension.restore(),
            Err(CoreError::ListenersNotSuspended)
        ));
    }
}
