use crate::http::build_client;
use crate::market::config::ROOT;
use crate::wizard::optimistic::{ToggleError, WatchlistEntry, WatchlistRemote};
use serde::{Deserialize, Serialize};
use urlencoding::encode;
use uuid::Uuid;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AddWatchRequest<'a> {
    item_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct AddWatchResponse {
    id: String,
}

pub async fn add_watch(item_id: &str, access_token: &str) -> Result<WatchlistEntry, ToggleError> {
    let client = build_client();
    let url = format!("{}/market/v1/watchlist", *ROOT);
    let response = client
        .post(url)
        .bearer_auth(access_token)
        .json(&AddWatchRequest { item_id })
        .send()
        .await
        .map_err(|err| ToggleError::Request(err.to_string()))?;
    if !response.status().is_success() {
        return Err(ToggleError::Request(format!("HTTP {}", response.status())));
    }
    let payload: AddWatchResponse = response
        .json()
        .await
        .map_err(|err| ToggleError::Request(err.to_string()))?;
    Ok(WatchlistEntry { id: payload.id })
}

pub async fn remove_watch(entry_id: &str, access_token: &str) -> Result<(), ToggleError> {
    let client = build_client();
    let url = format!("{}/market/v1/watchlist/{}", *ROOT, encode(entry_id));
    let response = client
        .delete(url)
        .bearer_auth(access_token)
        .send()
        .await
        .map_err(|err| ToggleError::Request(err.to_string()))?;
    if !response.status().is_success() {
        return Err(ToggleError::Request(format!("HTTP {}", response.status())));
    }
    Ok(())
}

#[derive(Clone)]
pub struct MarketWatchlistClient {
    access_token: String,
}

impl MarketWatchlistClient {
    pub fn new(access_token: String) -> Self {
        Self { access_token }
    }
}

impl WatchlistRemote for MarketWatchlistClient {
    async fn add(&self, item_id: &str) -> Result<WatchlistEntry, ToggleError> {
        add_watch(item_id, &self.access_token).await
    }

    async fn remove(&self, entry_id: &str) -> Result<(), ToggleError> {
        remove_watch(entry_id, &self.access_token).await
    }
}

/// Offline remote: every mutation succeeds with a synthetic entry id.
#[derive(Clone, Default)]
pub struct DemoWatchlistRemote;

impl WatchlistRemote for DemoWatchlistRemote {
    async fn add(&self, _item_id: &str) -> Result<WatchlistEntry, ToggleError> {
        Ok(WatchlistEntry {
            id: format!("watch-{}", Uuid::new_v4().simple()),
        })
    }

    async fn remove(&self, _entry_id: &str) -> Result<(), ToggleError> {
        Ok(())
    }
}
