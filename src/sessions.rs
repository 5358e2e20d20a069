use crate::wizard::controller::StepWizard;
use crate::wizard::optimistic::WatchlistToggle;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::Mutex;
use uuid::Uuid;

// Each wizard instance owns an independent store; the registries below are
// the only place sessions are shared, and each session sits behind its own
// lock so drafts never contend with each other.

#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<Uuid, Arc<Mutex<StepWizard>>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self, wizard: StepWizard) -> Uuid {
        let id = Uuid::new_v4();
        self.sessions
            .lock()
            .await
            .insert(id, Arc::new(Mutex::new(wizard)));
        id
    }

    pub async fn get(&self, id: Uuid) -> Option<Arc<Mutex<StepWizard>>> {
        self.sessions.lock().await.get(&id).cloned()
    }

    /// Drop the session: successful submission or explicit abandonment.
    pub async fn discard(&self, id: Uuid) -> bool {
        self.sessions.lock().await.remove(&id).is_some()
    }
}

#[derive(Clone, Default)]
pub struct WatchRegistry {
    toggles: Arc<Mutex<HashMap<String, Arc<Mutex<WatchlistToggle>>>>>,
}

impl WatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// One controller per item id. A seeded entry id marks the item as
    /// already watchlisted (edit/detail pages know this from the server).
    pub async fn get_or_create(
        &self,
        item_id: &str,
        seed_entry_id: Option<String>,
    ) -> Arc<Mutex<WatchlistToggle>> {
        let mut toggles = self.toggles.lock().await;
        toggles
            .entry(item_id.to_string())
            .or_insert_with(|| {
                let toggle = match seed_entry_id {
                    Some(entry_id) => WatchlistToggle::watched(item_id.to_string(), entry_id),
                    None => WatchlistToggle::new(item_id.to_string()),
                };
                Arc::new(Mutex::new(toggle))
            })
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wizard::DraftState;

    #[tokio::test]
    async fn sessions_are_isolated_and_discardable() {
        let store = SessionStore::new();
        let a = store.create(StepWizard::new(DraftState::new())).await;
        let b = store.create(StepWizard::new(DraftState::new())).await;
        assert_ne!(a, b);

        {
            let session = store.get(a).await.expect("session a");
            let mut wizard = session.lock().await;
            wizard.draft.set_step(3);
        }
        let other = store.get(b).await.expect("session b");
        assert_eq!(other.lock().await.draft.step(), 1);

        assert!(store.discard(a).await);
        assert!(store.get(a).await.is_none());
        assert!(!store.discard(a).await);
    }

    #[tokio::test]
    async fn watch_registry_reuses_controllers_and_honors_seed() {
        let registry = WatchRegistry::new();
        let first = registry.get_or_create("item-1", Some("entry-1".into())).await;
        assert!(first.lock().await.watchlisted);

        // second lookup returns the same controller, seed ignored
        let again = registry.get_or_create("item-1", None).await;
        assert!(Arc::ptr_eq(&first, &again));
    }
}
