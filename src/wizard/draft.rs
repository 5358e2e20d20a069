use crate::market::categories::CategoryNode;
use crate::market::listings::{ItemImage, PersistedItem};
use crate::wizard::attributes::{
    self, AuctionDuration, DeliveryPreference, InternalFields, MAX_CUSTOM_FEATURES,
};
use crate::wizard::media::UploadedImage;
use crate::wizard::resolver;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const MIN_STEP: u8 = 1;
pub const MAX_STEP: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    New,
    Used,
    Refurbished,
}

impl Condition {
    pub fn as_str(self) -> &'static str {
        match self {
            Condition::New => "new",
            Condition::Used => "used",
            Condition::Refurbished => "refurbished",
        }
    }

    pub fn from_raw(value: &str) -> Option<Self> {
        match value.trim() {
            "new" => Some(Self::New),
            "used" => Some(Self::Used),
            "refurbished" => Some(Self::Refurbished),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicDetails {
    pub title: String,
    pub description: String,
    pub category_id: String,
    pub subcategory_id: String,
    pub condition: Option<Condition>,
    /// Visible attributes only; reserved-prefix keys never land here.
    pub attributes: BTreeMap<String, String>,
    pub custom_features: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionInfo {
    pub starting_price: String,
    pub reserve_price: String,
    pub duration: Option<AuctionDuration>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Logistics {
    pub delivery_preference: Option<DeliveryPreference>,
}

// Shallow per-step patches: absent fields leave state untouched.

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicDetailsPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<String>,
    pub subcategory_id: Option<String>,
    pub condition: Option<Condition>,
    pub attributes: Option<BTreeMap<String, String>>,
    pub custom_features: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionInfoPatch {
    pub starting_price: Option<String>,
    pub reserve_price: Option<String>,
    pub duration: Option<AuctionDuration>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogisticsPatch {
    pub delivery_preference: Option<DeliveryPreference>,
}

/// The unit of work in progress: all wizard fields, the image sequence, the
/// clamped step counter, and transient UI-only state. Mutated exclusively by
/// the step controller and the HTTP handlers that front it.
#[derive(Debug, Clone)]
pub struct DraftState {
    /// Present once the server has persisted any version of the draft.
    pub draft_item_id: Option<String>,
    pub basic: BasicDetails,
    pub auction: AuctionInfo,
    pub logistics: Logistics,
    pub images: Vec<UploadedImage>,
    step: u8,
    /// Unrecognized reserved-prefix attributes, preserved for submission.
    pub internal_extra: BTreeMap<String, String>,
    pub field_errors: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DraftState {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            draft_item_id: None,
            basic: BasicDetails::default(),
            auction: AuctionInfo::default(),
            logistics: Logistics::default(),
            images: Vec::new(),
            step: MIN_STEP,
            internal_extra: BTreeMap::new(),
            field_errors: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuild a draft from a persisted item, its image list, and the
    /// category tree. Out-of-range steps clamp; an unknown category id
    /// degrades per the resolver contract.
    pub fn hydrate(
        item: &PersistedItem,
        images: &[ItemImage],
        tree: &[CategoryNode],
        step: i32,
    ) -> Self {
        let resolved = resolver::resolve(tree, &item.category_id);
        let (visible, internal) = attributes::split_attributes(&item.attributes);

        let mut draft = Self::new();
        draft.draft_item_id = Some(item.id.clone());
        draft.basic = BasicDetails {
            title: item.title.clone(),
            description: item.description.clone(),
            category_id: resolved.category_id,
            subcategory_id: resolved.subcategory_id,
            condition: item.condition.as_deref().and_then(Condition::from_raw),
            attributes: visible,
            custom_features: internal.custom_features,
        };
        draft.auction = AuctionInfo {
            starting_price: item.starting_price.clone().unwrap_or_default(),
            reserve_price: item.reserve_price.clone().unwrap_or_default(),
            duration: internal.auction_duration,
        };
        draft.logistics = Logistics {
            delivery_preference: internal.delivery_preference,
        };
        draft.internal_extra = internal.extra;
        draft.images = images
            .iter()
            .enumerate()
            .map(|(index, image)| UploadedImage {
                id: image.id.clone(),
                position: index,
                variants: image.variants.clone(),
            })
            .collect();
        draft.set_step(step);
        draft
    }

    pub fn step(&self) -> u8 {
        self.step
    }

    /// Clamp to [1, 3]. A resumed draft recording an invalid step is
    /// silently corrected to the nearest bound.
    pub fn set_step(&mut self, requested: i32) {
        self.step = requested.clamp(MIN_STEP as i32, MAX_STEP as i32) as u8;
    }

    pub fn patch_basic(&mut self, patch: BasicDetailsPatch) {
        if let Some(title) = patch.title {
            self.basic.title = title;
        }
        if let Some(description) = patch.description {
            self.basic.description = description;
        }
        if let Some(category_id) = patch.category_id {
            self.basic.category_id = category_id;
        }
        if let Some(subcategory_id) = patch.subcategory_id {
            self.basic.subcategory_id = subcategory_id;
        }
        if let Some(condition) = patch.condition {
            self.basic.condition = Some(condition);
        }
        if let Some(attrs) = patch.attributes {
            // Reserved keys can only enter through the attributes boundary,
            // never through step-1 editing.
            for (key, value) in attrs {
                if !key.starts_with(attributes::RESERVED_PREFIX) {
                    self.basic.attributes.insert(key, value);
                }
            }
        }
        if let Some(mut features) = patch.custom_features {
            features.truncate(MAX_CUSTOM_FEATURES);
            self.basic.custom_features = features;
        }
        self.touch();
    }

    pub fn patch_auction(&mut self, patch: AuctionInfoPatch) {
        if let Some(starting) = patch.starting_price {
            self.auction.starting_price = starting;
        }
        if let Some(reserve) = patch.reserve_price {
            self.auction.reserve_price = reserve;
        }
        if let Some(duration) = patch.duration {
            self.auction.duration = Some(duration);
        }
        self.touch();
    }

    pub fn patch_logistics(&mut self, patch: LogisticsPatch) {
        if let Some(delivery) = patch.delivery_preference {
            self.logistics.delivery_preference = Some(delivery);
        }
        self.touch();
    }

    pub fn add_image(&mut self, id: String, variants: BTreeMap<String, String>) {
        if self.images.iter().any(|image| image.id == id) {
            return;
        }
        self.images.push(UploadedImage {
            id,
            position: self.images.len(),
            variants,
        });
        self.reindex();
    }

    pub fn remove_image(&mut self, id: &str) -> bool {
        let before = self.images.len();
        self.images.retain(|image| image.id != id);
        let removed = self.images.len() != before;
        if removed {
            self.reindex();
        }
        removed
    }

    /// Reorder by id list. Unknown ids are ignored; images omitted from the
    /// new order keep their relative order after the ordered prefix.
    pub fn reorder_images(&mut self, new_order: &[String]) {
        let mut reordered = Vec::with_capacity(self.images.len());
        for id in new_order {
            if let Some(index) = self.images.iter().position(|image| &image.id == id) {
                reordered.push(self.images.remove(index));
            }
        }
        reordered.append(&mut self.images);
        self.images = reordered;
        self.reindex();
    }

    fn reindex(&mut self) {
        for (index, image) in self.images.iter_mut().enumerate() {
            image.position = index;
        }
        self.touch();
    }

    /// Internal fields as the submission boundary expects them.
    pub fn internal_fields(&self) -> InternalFields {
        InternalFields {
            custom_features: self.basic.custom_features.clone(),
            auction_duration: self.auction.duration,
            delivery_preference: self.logistics.delivery_preference,
            extra: self.internal_extra.clone(),
        }
    }

    /// The single id the marketplace persists: the leaf.
    pub fn leaf_category_id(&self) -> &str {
        if self.basic.subcategory_id.is_empty() {
            &self.basic.category_id
        } else {
            &self.basic.subcategory_id
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl Default for DraftState {
    fn default() -> Self {
        Self::new()
    }
}
