use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

use crate::utils::error::SessionError;

use super::driver::ConversationDriver;
use super::monitor::SessionMonitor;

/// Thread-safe registry of live sessions for the HTTP layer.
///
/// One driver and one monitor per session id. Drivers are internally
/// synchronized; monitors carry the sticky final-lap flag and so live behind
/// a mutex for the lifetime of the session.
#[derive(Default)]
pub struct SessionRegistry {
    drivers: DashMap<String, Arc<ConversationDriver>>,
    monitors: DashMap<String, Arc<Mutex<SessionMonitor>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create<F>(
        &self,
        session_id: &str,
        init: F,
    ) -> Result<Arc<ConversationDriver>, SessionError>
    where
        F: FnOnce() -> Result<ConversationDriver, SessionError>,
    {
        if let Some(driver) = self.drivers.get(session_id) {
            debug!("Session {} found in registry", session_id);
            return Ok(driver.clone());
        }

        match self.drivers.entry(session_id.to_string()) {
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(entry) => {
                let driver = Arc::new(init()?);
                info!("Session {} created", session_id);
                entry.insert(driver.clone());
                Ok(driver)
            }
        }
    }

    pub fn monitor_or_create<F>(&self, session_id: &str, init: F) -> Arc<Mutex<SessionMonitor>>
    where
        F: FnOnce() -> SessionMonitor,
    {
        self.monitors
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(init())))
            .clone()
    }

    /// Evict a finished session. The transcript file is left untouched.
    pub fn remove(&self, session_id: &str) -> Option<Arc<ConversationDriver>> {
        self.monitors.remove(session_id);
        self.drivers.remove(session_id).map(|(_, driver)| driver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::session::{DriverConfig, PromptSet};
    use crate::transcript::TranscriptWriter;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NeverCalledModel;

    #[async_trait::async_trait]
    impl crate::services::session::LlmProvider for NeverCalledModel {
        async fn run(&self, _prompt: &str) -> anyhow::Result<String> {
            unreachable!("registry tests never invoke the model")
        }
        async fn generate(&self, _prompt: &str) -> anyhow::Result<String> {
            unreachable!()
        }
        fn memory_len(&self) -> usize {
            0
        }
        fn last_messages(&self, _n: usize) -> Vec<crate::models::chat::ChatMessage> {
            Vec::new()
        }
    }

    fn test_driver(dir: &tempfile::TempDir, name: &str) -> ConversationDriver {
        ConversationDriver::new(
            Arc::new(NeverCalledModel),
            None,
            None,
            TranscriptWriter::create(dir.path().join(name)).unwrap(),
            PromptSet::from_parts("a", "b"),
            DriverConfig::default(),
        )
    }

    #[test]
    fn test_get_or_create_initializes_once() {
        let dir = tempfile::tempdir().unwrap();
        let registry = SessionRegistry::new();
        let created = AtomicUsize::new(0);

        let first = registry
            .get_or_create("s1", || {
                created.fetch_add(1, Ordering::SeqCst);
                Ok(test_driver(&dir, "s1.json"))
            })
            .unwrap();

        for _ in 0..2 {
            let again = registry
                .get_or_create("s1", || {
                    created.fetch_add(1, Ordering::SeqCst);
                    Ok(test_driver(&dir, "s1.json"))
                })
                .unwrap();
            assert!(Arc::ptr_eq(&first, &again));
        }

        assert_eq!(created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_remove_drops_both_driver_and_monitor() {
        let dir = tempfile::tempdir().unwrap();
        let registry = SessionRegistry::new();
        registry
            .get_or_create("s1", || Ok(test_driver(&dir, "s1.json")))
            .unwrap();
        registry.monitor_or_create("s1", || {
            SessionMonitor::new(dir.path().join("s1.json"), Default::default())
        });

        assert!(registry.remove("s1").is_some());
        // Second removal finds nothing: both maps were cleared
        assert!(registry.remove("s1").is_none());
    }
}
