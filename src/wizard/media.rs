use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Server-generated size renditions. Each variant is independently optional
/// per image: processing may not have produced all of them yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageVariant {
    Thumbnail,
    Medium,
    Full,
}

impl ImageVariant {
    pub const ALL: [ImageVariant; 3] = [
        ImageVariant::Thumbnail,
        ImageVariant::Medium,
        ImageVariant::Full,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ImageVariant::Thumbnail => "thumbnail",
            ImageVariant::Medium => "medium",
            ImageVariant::Full => "full",
        }
    }

    /// Reference width in CSS pixels, used as the srcset width descriptor.
    pub fn reference_width(self) -> u32 {
        match self {
            ImageVariant::Thumbnail => 200,
            ImageVariant::Medium => 600,
            ImageVariant::Full => 1200,
        }
    }

    pub fn from_raw(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "thumbnail" => Some(Self::Thumbnail),
            "medium" => Some(Self::Medium),
            "full" => Some(Self::Full),
            _ => None,
        }
    }
}

/// One uploaded image in the draft. `position` is re-derived from the
/// sequence index after every mutation; the element at position 0 is the
/// cover.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadedImage {
    pub id: String,
    pub position: usize,
    #[serde(default)]
    pub variants: BTreeMap<String, String>,
}

/// Stored URL for a variant, or `None` while processing is incomplete.
/// Callers omit missing candidates instead of treating this as an error.
pub fn url_for(image: &UploadedImage, variant: ImageVariant) -> Option<&str> {
    image
        .variants
        .get(variant.name())
        .map(String::as_str)
        .filter(|url| !url.is_empty())
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SourceCandidate {
    pub url: String,
    pub width: u32,
}

/// Width-descriptor list over the *available* variants, ascending, for
/// responsive image negotiation. The single-URL fallback target is always
/// the medium variant.
pub fn build_source_set(image: &UploadedImage) -> Vec<SourceCandidate> {
    ImageVariant::ALL
        .iter()
        .filter_map(|variant| {
            url_for(image, *variant).map(|url| SourceCandidate {
                url: url.to_string(),
                width: variant.reference_width(),
            })
        })
        .collect()
}

pub fn fallback_url(image: &UploadedImage) -> Option<&str> {
    url_for(image, ImageVariant::Medium)
}

/// Cover selection: the image whose position is 0, else the first element.
/// Only an empty sequence has no cover.
pub fn cover_image(images: &[UploadedImage]) -> Option<&UploadedImage> {
    images
        .iter()
        .find(|image| image.position == 0)
        .or_else(|| images.first())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(id: &str, position: usize, variants: &[(&str, &str)]) -> UploadedImage {
        UploadedImage {
            id: id.to_string(),
            position,
            variants: variants
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn url_for_missing_variant_is_none() {
        let img = image("a", 0, &[("medium", "https://cdn/m.jpg")]);
        assert_eq!(url_for(&img, ImageVariant::Medium), Some("https://cdn/m.jpg"));
        assert_eq!(url_for(&img, ImageVariant::Full), None);
        assert_eq!(url_for(&img, ImageVariant::Thumbnail), None);
    }

    #[test]
    fn source_set_is_ascending_and_skips_missing() {
        let img = image(
            "a",
            0,
            &[
                ("full", "https://cdn/f.jpg"),
                ("thumbnail", "https://cdn/t.jpg"),
            ],
        );
        let set = build_source_set(&img);
        assert_eq!(set.len(), 2);
        assert_eq!(set[0].width, 200);
        assert_eq!(set[0].url, "https://cdn/t.jpg");
        assert_eq!(set[1].width, 1200);
    }

    #[test]
    fn fallback_is_medium() {
        let img = image(
            "a",
            0,
            &[("medium", "https://cdn/m.jpg"), ("full", "https://cdn/f.jpg")],
        );
        assert_eq!(fallback_url(&img), Some("https://cdn/m.jpg"));
    }

    #[test]
    fn cover_prefers_position_zero() {
        let images = vec![image("x", 1, &[]), image("y", 0, &[])];
        assert_eq!(cover_image(&images).map(|i| i.id.as_str()), Some("y"));
    }

    #[test]
    fn cover_falls_back_to_first_element() {
        let images = vec![image("x", 3, &[]), image("y", 5, &[])];
        assert_eq!(cover_image(&images).map(|i| i.id.as_str()), Some("x"));
    }

    #[test]
    fn cover_of_empty_sequence_is_none() {
        assert!(cover_image(&[]).is_none());
    }
}
