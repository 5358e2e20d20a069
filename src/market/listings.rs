use crate::http::build_client;
use crate::market::config::ROOT;
use crate::wizard::controller::{ListingBackend, SubmitError, SubmitReceipt};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::collections::BTreeMap;
use thiserror::Error;
use urlencoding::encode;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ListingFetchError {
    #[error("listing request failed: {0}")]
    Request(String),
    #[error("listing not found")]
    NotFound,
}

/// Flattened create-or-update payload. Internal side-channel fields are
/// already merged back into `attributes`, the category is the single leaf id,
/// and `image_ids` carries the final display order.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ListingSubmission {
    pub title: String,
    pub description: String,
    pub category_id: String,
    pub condition: String,
    pub attributes: BTreeMap<String, String>,
    pub starting_price: String,
    pub reserve_price: Option<String>,
    pub image_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ItemIdResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RejectionBody {
    #[serde(default)]
    errors: BTreeMap<String, String>,
}

/// Persisted item as the edit/resume entry receives it from the server.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedItem {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category_id: String,
    pub condition: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    pub starting_price: Option<String>,
    pub reserve_price: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemImage {
    pub id: String,
    #[serde(default)]
    pub variants: BTreeMap<String, String>,
}

pub async fn create_listing(
    payload: &ListingSubmission,
    access_token: &str,
) -> Result<SubmitReceipt, SubmitError> {
    let client = build_client();
    let url = format!("{}/market/v1/listings", *ROOT);
    let response = client
        .post(url)
        .bearer_auth(access_token)
        .json(payload)
        .send()
        .await
        .map_err(|err| SubmitError::Request(err.to_string()))?;
    read_receipt(response).await
}

pub async fn update_listing(
    item_id: &str,
    payload: &ListingSubmission,
    access_token: &str,
) -> Result<SubmitReceipt, SubmitError> {
    let client = build_client();
    let url = format!("{}/market/v1/listings/{}", *ROOT, encode(item_id));
    let response = client
        .put(url)
        .bearer_auth(access_token)
        .json(payload)
        .send()
        .await
        .map_err(|err| SubmitError::Request(err.to_string()))?;
    read_receipt(response).await
}

async fn read_receipt(response: reqwest::Response) -> Result<SubmitReceipt, SubmitError> {
    let status = response.status();
    if status == 422 {
        let body: RejectionBody = response
            .json()
            .await
            .unwrap_or(RejectionBody {
                errors: BTreeMap::new(),
            });
        return Err(SubmitError::Rejected {
            fields: body.errors,
        });
    }
    if !status.is_success() {
        return Err(SubmitError::Request(format!("HTTP {status}")));
    }
    let payload: ItemIdResponse = response
        .json()
        .await
        .map_err(|err| SubmitError::Request(err.to_string()))?;
    Ok(SubmitReceipt { id: payload.id })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditBundle {
    pub item: PersistedItem,
    #[serde(default)]
    pub images: Vec<ItemImage>,
    #[serde(default)]
    pub step: i32,
}

/// Fetch a persisted item plus its image list and last-saved step for the
/// edit entry point.
pub async fn fetch_item_for_edit(
    item_id: &str,
    access_token: &str,
) -> Result<EditBundle, ListingFetchError> {
    let client = build_client();
    let url = format!("{}/market/v1/listings/{}/draft", *ROOT, encode(item_id));
    let response = client
        .get(url)
        .bearer_auth(access_token)
        .send()
        .await
        .map_err(|err| ListingFetchError::Request(err.to_string()))?;
    if response.status() == 404 {
        return Err(ListingFetchError::NotFound);
    }
    if !response.status().is_success() {
        return Err(ListingFetchError::Request(format!(
            "HTTP {}",
            response.status()
        )));
    }
    response
        .json::<EditBundle>()
        .await
        .map_err(|err| ListingFetchError::Request(err.to_string()))
}

/// Live backend: create-or-update against the marketplace REST surface.
#[derive(Clone)]
pub struct MarketListingClient {
    access_token: String,
}

impl MarketListingClient {
    pub fn new(access_token: String) -> Self {
        Self { access_token }
    }
}

impl ListingBackend for MarketListingClient {
    async fn create_listing(
        &self,
        payload: &ListingSubmission,
    ) -> Result<SubmitReceipt, SubmitError> {
        create_listing(payload, &self.access_token).await
    }

    async fn update_listing(
        &self,
        item_id: &str,
        payload: &ListingSubmission,
    ) -> Result<SubmitReceipt, SubmitError> {
        update_listing(item_id, payload, &self.access_token).await
    }
}

/// Offline backend used when `MERCURY_ENABLE_NETWORK` is off: creates mint a
/// synthetic item id, updates echo the id they were asked to update.
#[derive(Clone, Default)]
pub struct DemoListingBackend;

impl ListingBackend for DemoListingBackend {
    async fn create_listing(
        &self,
        _payload: &ListingSubmission,
    ) -> Result<SubmitReceipt, SubmitError> {
        Ok(SubmitReceipt {
            id: format!("MERC-{}", Uuid::new_v4().simple()),
        })
    }

    async fn update_listing(
        &self,
        item_id: &str,
        _payload: &ListingSubmission,
    ) -> Result<SubmitReceipt, SubmitError> {
        Ok(SubmitReceipt {
            id: item_id.to_string(),
        })
    }
}
