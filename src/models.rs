use crate::wizard::controller::{StepWizard, WizardPhase};
use crate::wizard::draft::{AuctionInfo, BasicDetails, Logistics};
use crate::wizard::media::{self, SourceCandidate, UploadedImage};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Field-keyed messages for validation-shaped failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<BTreeMap<String, String>>,
}

impl ApiError {
    pub fn new(error: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            detail: Some(detail.into()),
            fields: None,
        }
    }
}

/// One image as the UI renders it: the medium fallback URL plus the
/// ascending width-descriptor source set over whichever variants exist.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageView {
    pub id: String,
    pub position: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub source_set: Vec<SourceCandidate>,
    pub variants: BTreeMap<String, String>,
}

impl ImageView {
    fn from_image(image: &UploadedImage) -> Self {
        Self {
            id: image.id.clone(),
            position: image.position,
            url: media::fallback_url(image).map(str::to_string),
            source_set: media::build_source_set(image),
            variants: image.variants.clone(),
        }
    }
}

/// Full wizard snapshot returned by the draft routes. Only visible
/// attributes ever appear here; reserved-prefix storage stays behind the
/// attributes boundary.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftView {
    pub draft_id: String,
    pub phase: WizardPhase,
    pub step: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft_item_id: Option<String>,
    pub basic_details: BasicDetails,
    pub auction_info: AuctionInfo,
    pub logistics: Logistics,
    pub images: Vec<ImageView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image_id: Option<String>,
    pub field_errors: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DraftView {
    pub fn from_wizard(draft_id: Uuid, wizard: &StepWizard) -> Self {
        let draft = &wizard.draft;
        Self {
            draft_id: draft_id.to_string(),
            phase: wizard.phase(),
            step: draft.step(),
            draft_item_id: draft.draft_item_id.clone(),
            basic_details: draft.basic.clone(),
            auction_info: draft.auction.clone(),
            logistics: draft.logistics.clone(),
            images: draft.images.iter().map(ImageView::from_image).collect(),
            cover_image_id: media::cover_image(&draft.images).map(|image| image.id.clone()),
            field_errors: draft.field_errors.clone(),
            last_error: wizard.last_failure().map(|err| err.to_string()),
            created_at: draft.created_at,
            updated_at: draft.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub item_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wizard::DraftState;
    use std::collections::BTreeMap;

    #[test]
    fn view_reflects_cover_and_source_sets() {
        let mut draft = DraftState::new();
        let mut variants = BTreeMap::new();
        variants.insert("thumbnail".to_string(), "https://cdn/t.jpg".to_string());
        variants.insert("medium".to_string(), "https://cdn/m.jpg".to_string());
        draft.add_image("img-1".into(), variants);
        draft.add_image("img-2".into(), BTreeMap::new());

        let wizard = StepWizard::new(draft);
        let view = DraftView::from_wizard(Uuid::nil(), &wizard);

        assert_eq!(view.phase, WizardPhase::Step1);
        assert_eq!(view.cover_image_id.as_deref(), Some("img-1"));
        assert_eq!(view.images[0].url.as_deref(), Some("https://cdn/m.jpg"));
        assert_eq!(view.images[0].source_set.len(), 2);
        assert_eq!(view.images[0].source_set[0].width, 200);
        assert!(view.images[1].url.is_none());
    }
}
