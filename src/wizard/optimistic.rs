use serde::Serialize;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ToggleError {
    #[error("watchlist request failed: {0}")]
    Request(String),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WatchlistEntry {
    pub id: String,
}

/// Seam to the watchlist add/remove endpoints.
#[allow(async_fn_in_trait)]
pub trait WatchlistRemote {
    async fn add(&self, item_id: &str) -> Result<WatchlistEntry, ToggleError>;
    async fn remove(&self, entry_id: &str) -> Result<(), ToggleError>;
}

/// Flip state first, await the remote call, commit on success, roll back on
/// failure. The flip/await/rollback choreography lives here once so every
/// optimistic single-field edit shares it instead of re-spelling it.
pub async fn run_optimistic<S, T, E, Fut>(
    state: &mut S,
    apply: impl FnOnce(&mut S),
    call: Fut,
    commit: impl FnOnce(&mut S, T),
    rollback: impl FnOnce(&mut S),
) -> Result<(), E>
where
    Fut: Future<Output = Result<T, E>>,
{
    apply(state);
    match call.await {
        Ok(value) => {
            commit(state, value);
            Ok(())
        }
        Err(err) => {
            rollback(state);
            Err(err)
        }
    }
}

/// Optimistic controller for the single boolean watchlist relation. One
/// instance per item; a toggle in flight makes further toggles no-ops until
/// it settles.
#[derive(Debug, Clone)]
pub struct WatchlistToggle {
    pub item_id: String,
    pub entry_id: Option<String>,
    pub watchlisted: bool,
    in_flight: bool,
}

/// What a `toggle` call did: `Applied` means the mutation settled (either
/// way), `Ignored` means another toggle was already in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Applied,
    Ignored,
}

impl WatchlistToggle {
    pub fn new(item_id: String) -> Self {
        Self {
            item_id,
            entry_id: None,
            watchlisted: false,
            in_flight: false,
        }
    }

    /// Known-watchlisted construction for pages that already hold the entry.
    pub fn watched(item_id: String, entry_id: String) -> Self {
        Self {
            item_id,
            entry_id: Some(entry_id),
            watchlisted: true,
            in_flight: false,
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub async fn toggle<R: WatchlistRemote>(
        &mut self,
        remote: &R,
    ) -> Result<ToggleOutcome, ToggleError> {
        if self.in_flight {
            return Ok(ToggleOutcome::Ignored);
        }
        self.in_flight = true;
        let result = if self.watchlisted {
            self.remove(remote).await
        } else {
            self.add(remote).await
        };
        self.in_flight = false;
        result.map(|_| ToggleOutcome::Applied)
    }

    async fn add<R: WatchlistRemote>(&mut self, remote: &R) -> Result<(), ToggleError> {
        let item_id = self.item_id.clone();
        run_optimistic(
            self,
            |state| state.watchlisted = true,
            remote.add(&item_id),
            |state, entry: WatchlistEntry| state.entry_id = Some(entry.id),
            |state| {
                warn!(target = "mercury.wizard", item_id = %state.item_id, "watch add rolled back");
                state.watchlisted = false;
            },
        )
        .await
    }

    async fn remove<R: WatchlistRemote>(&mut self, remote: &R) -> Result<(), ToggleError> {
        // The entry id is only cleared once removal succeeds; until then it
        // stays known so a rollback needs no re-fetch.
        let Some(entry_id) = self.entry_id.clone() else {
            self.watchlisted = false;
            return Ok(());
        };
        run_optimistic(
            self,
            |state| state.watchlisted = false,
            remote.remove(&entry_id),
            |state, ()| state.entry_id = None,
            |state| {
                warn!(target = "mercury.wizard", item_id = %state.item_id, "watch remove rolled back");
                state.watchlisted = true;
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeRemote {
        fail_next: Mutex<bool>,
        adds: Mutex<Vec<String>>,
        removes: Mutex<Vec<String>>,
    }

    impl FakeRemote {
        fn failing() -> Self {
            let remote = Self::default();
            *remote.fail_next.lock().unwrap() = true;
            remote
        }
    }

    impl WatchlistRemote for FakeRemote {
        async fn add(&self, item_id: &str) -> Result<WatchlistEntry, ToggleError> {
            if std::mem::take(&mut *self.fail_next.lock().unwrap()) {
                return Err(ToggleError::Request("offline".into()));
            }
            self.adds.lock().unwrap().push(item_id.to_string());
            Ok(WatchlistEntry {
                id: format!("entry-{item_id}"),
            })
        }

        async fn remove(&self, entry_id: &str) -> Result<(), ToggleError> {
            if std::mem::take(&mut *self.fail_next.lock().unwrap()) {
                return Err(ToggleError::Request("offline".into()));
            }
            self.removes.lock().unwrap().push(entry_id.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn state_flips_before_the_call_settles() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicBool, Ordering};

        let flag = Arc::new(AtomicBool::new(false));
        let observer = flag.clone();
        let mut state = flag.clone();
        let call = async move {
            // the remote call only runs after the optimistic apply
            assert!(observer.load(Ordering::SeqCst));
            Ok::<_, ToggleError>(())
        };
        run_optimistic(
            &mut state,
            |s| s.store(true, Ordering::SeqCst),
            call,
            |_, ()| {},
            |_| {},
        )
        .await
        .expect("call succeeds");
    }

    #[tokio::test]
    async fn add_records_the_server_issued_entry_id() {
        let mut toggle = WatchlistToggle::new("item-1".into());
        let remote = FakeRemote::default();

        let outcome = toggle.toggle(&remote).await.expect("toggle");
        assert_eq!(outcome, ToggleOutcome::Applied);
        assert!(toggle.watchlisted);
        assert_eq!(toggle.entry_id.as_deref(), Some("entry-item-1"));
    }

    #[tokio::test]
    async fn failed_add_rolls_back_and_leaves_no_entry() {
        let mut toggle = WatchlistToggle::new("item-1".into());
        let remote = FakeRemote::failing();

        let err = toggle.toggle(&remote).await.expect_err("should fail");
        assert_eq!(err, ToggleError::Request("offline".into()));
        assert!(!toggle.watchlisted);
        assert_eq!(toggle.entry_id, None);
        assert!(!toggle.is_in_flight());
    }

    #[tokio::test]
    async fn failed_remove_rolls_back_and_keeps_the_entry_id() {
        let mut toggle = WatchlistToggle::watched("item-1".into(), "entry-9".into());
        let remote = FakeRemote::failing();

        toggle.toggle(&remote).await.expect_err("should fail");
        assert!(toggle.watchlisted);
        assert_eq!(toggle.entry_id.as_deref(), Some("entry-9"));
    }

    #[tokio::test]
    async fn successful_remove_clears_the_entry() {
        let mut toggle = WatchlistToggle::watched("item-1".into(), "entry-9".into());
        let remote = FakeRemote::default();

        toggle.toggle(&remote).await.expect("toggle");
        assert!(!toggle.watchlisted);
        assert_eq!(toggle.entry_id, None);
        assert_eq!(remote.removes.lock().unwrap().as_slice(), ["entry-9"]);
    }

    #[tokio::test]
    async fn round_trip_add_then_remove() {
        let mut toggle = WatchlistToggle::new("item-1".into());
        let remote = FakeRemote::default();

        toggle.toggle(&remote).await.expect("add");
        assert!(toggle.watchlisted);
        toggle.toggle(&remote).await.expect("remove");
        assert!(!toggle.watchlisted);
        assert_eq!(toggle.entry_id, None);
    }

    #[tokio::test]
    async fn in_flight_toggle_ignores_reentry() {
        let mut toggle = WatchlistToggle::new("item-1".into());
        // simulate a pending mutation
        toggle.in_flight = true;
        let remote = FakeRemote::default();

        let outcome = toggle.toggle(&remote).await.expect("ignored");
        assert_eq!(outcome, ToggleOutcome::Ignored);
        assert!(!toggle.watchlisted);
        assert!(remote.adds.lock().unwrap().is_empty());
    }
}
