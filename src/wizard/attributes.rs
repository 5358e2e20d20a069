use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// The marketplace persists one flat string→string attribute bag per item.
// Structured wizard fields ride along in it under reserved `_`-prefixed keys.
// This module is the single serialize/deserialize boundary for that split:
// nothing else in the crate filters keys ad hoc.

pub const RESERVED_PREFIX: char = '_';
pub const CUSTOM_FEATURES_KEY: &str = "_customFeatures";
pub const AUCTION_DURATION_KEY: &str = "_auctionDuration";
pub const DELIVERY_PREFERENCE_KEY: &str = "_deliveryPreference";

pub const MAX_CUSTOM_FEATURES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuctionDuration {
    #[serde(rename = "24h")]
    Hours24,
    #[serde(rename = "3d")]
    Days3,
    #[serde(rename = "7d")]
    Days7,
}

impl AuctionDuration {
    pub fn as_str(self) -> &'static str {
        match self {
            AuctionDuration::Hours24 => "24h",
            AuctionDuration::Days3 => "3d",
            AuctionDuration::Days7 => "7d",
        }
    }

    pub fn from_raw(value: &str) -> Option<Self> {
        match value.trim() {
            "24h" => Some(Self::Hours24),
            "3d" => Some(Self::Days3),
            "7d" => Some(Self::Days7),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryPreference {
    Meetup,
    BuyerArranges,
    SellerArranges,
}

impl DeliveryPreference {
    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryPreference::Meetup => "meetup",
            DeliveryPreference::BuyerArranges => "buyer_arranges",
            DeliveryPreference::SellerArranges => "seller_arranges",
        }
    }

    pub fn from_raw(value: &str) -> Option<Self> {
        match value.trim() {
            "meetup" => Some(Self::Meetup),
            "buyer_arranges" => Some(Self::BuyerArranges),
            "seller_arranges" => Some(Self::SellerArranges),
            _ => None,
        }
    }
}

/// Structured fields recovered from the reserved keys. `extra` carries any
/// unrecognized reserved key verbatim so round-tripping never loses data the
/// server may rely on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InternalFields {
    pub custom_features: Vec<String>,
    pub auction_duration: Option<AuctionDuration>,
    pub delivery_preference: Option<DeliveryPreference>,
    pub extra: BTreeMap<String, String>,
}

/// Split a stored bag into (visible attributes, internal fields). Visible
/// attributes never contain a reserved-prefix key afterwards.
pub fn split_attributes(
    stored: &BTreeMap<String, String>,
) -> (BTreeMap<String, String>, InternalFields) {
    let mut visible = BTreeMap::new();
    let mut internal = InternalFields::default();

    for (key, value) in stored {
        if !key.starts_with(RESERVED_PREFIX) {
            visible.insert(key.clone(), value.clone());
            continue;
        }
        match key.as_str() {
            CUSTOM_FEATURES_KEY => internal.custom_features = decode_features(value),
            AUCTION_DURATION_KEY => internal.auction_duration = AuctionDuration::from_raw(value),
            DELIVERY_PREFERENCE_KEY => {
                internal.delivery_preference = DeliveryPreference::from_raw(value);
            }
            _ => {
                internal.extra.insert(key.clone(), value.clone());
            }
        }
    }

    (visible, internal)
}

/// Merge visible attributes and internal fields back into the flat bag the
/// submission carries. Inverse of [`split_attributes`].
pub fn merge_attributes(
    visible: &BTreeMap<String, String>,
    internal: &InternalFields,
) -> BTreeMap<String, String> {
    let mut merged: BTreeMap<String, String> = visible
        .iter()
        .filter(|(key, _)| !key.starts_with(RESERVED_PREFIX))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    if !internal.custom_features.is_empty() {
        merged.insert(
            CUSTOM_FEATURES_KEY.to_string(),
            encode_features(&internal.custom_features),
        );
    }
    if let Some(duration) = internal.auction_duration {
        merged.insert(AUCTION_DURATION_KEY.to_string(), duration.as_str().to_string());
    }
    if let Some(delivery) = internal.delivery_preference {
        merged.insert(
            DELIVERY_PREFERENCE_KEY.to_string(),
            delivery.as_str().to_string(),
        );
    }
    for (key, value) in &internal.extra {
        merged.insert(key.clone(), value.clone());
    }

    merged
}

fn encode_features(features: &[String]) -> String {
    let capped: Vec<&String> = features.iter().take(MAX_CUSTOM_FEATURES).collect();
    serde_json::to_string(&capped).unwrap_or_else(|_| "[]".to_string())
}

fn decode_features(raw: &str) -> Vec<String> {
    // Lenient: a value that predates the JSON encoding becomes one feature.
    let mut features = match serde_json::from_str::<Vec<String>>(raw) {
        Ok(parsed) => parsed,
        Err(_) if raw.trim().is_empty() => Vec::new(),
        Err(_) => vec![raw.trim().to_string()],
    };
    features.retain(|feature| !feature.trim().is_empty());
    features.truncate(MAX_CUSTOM_FEATURES);
    features
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored_bag() -> BTreeMap<String, String> {
        let mut bag = BTreeMap::new();
        bag.insert("Brand".to_string(), "Aurora".to_string());
        bag.insert("Color".to_string(), "Teal".to_string());
        bag.insert(
            CUSTOM_FEATURES_KEY.to_string(),
            r#"["Original box","Receipt included"]"#.to_string(),
        );
        bag.insert(AUCTION_DURATION_KEY.to_string(), "3d".to_string());
        bag.insert(DELIVERY_PREFERENCE_KEY.to_string(), "meetup".to_string());
        bag.insert("_legacyFlag".to_string(), "1".to_string());
        bag
    }

    #[test]
    fn split_filters_every_reserved_key() {
        let (visible, internal) = split_attributes(&stored_bag());
        assert_eq!(visible.len(), 2);
        assert!(visible.keys().all(|key| !key.starts_with('_')));
        assert_eq!(internal.custom_features.len(), 2);
        assert_eq!(internal.auction_duration, Some(AuctionDuration::Days3));
        assert_eq!(
            internal.delivery_preference,
            Some(DeliveryPreference::Meetup)
        );
        assert_eq!(internal.extra.get("_legacyFlag").map(String::as_str), Some("1"));
    }

    #[test]
    fn merge_round_trips_the_stored_bag() {
        let stored = stored_bag();
        let (visible, internal) = split_attributes(&stored);
        assert_eq!(merge_attributes(&visible, &internal), stored);
    }

    #[test]
    fn features_cap_at_three() {
        let raw = r#"["a","b","c","d","e"]"#;
        assert_eq!(decode_features(raw).len(), MAX_CUSTOM_FEATURES);

        let many: Vec<String> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
        let encoded = encode_features(&many);
        assert_eq!(decode_features(&encoded), vec!["a", "b", "c"]);
    }

    #[test]
    fn legacy_plain_value_becomes_one_feature() {
        assert_eq!(decode_features("hand painted"), vec!["hand painted"]);
        assert!(decode_features("   ").is_empty());
    }

    #[test]
    fn unknown_duration_is_dropped_not_fatal() {
        let mut bag = BTreeMap::new();
        bag.insert(AUCTION_DURATION_KEY.to_string(), "48h".to_string());
        let (_, internal) = split_attributes(&bag);
        assert_eq!(internal.auction_duration, None);
    }
}
