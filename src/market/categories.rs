use crate::http::build_client;
use crate::market::config::ROOT;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CategoryFetchError {
    #[error("category tree request failed: {0}")]
    Request(String),
}

/// Top-level category with its owned subcategories. Order is significant:
/// resolution scans the sequence the server returned it in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryNode {
    pub id: String,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub categories: Vec<SubcategoryNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubcategoryNode {
    pub id: String,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Deserialize)]
struct CategoryTreeResponse {
    #[serde(default)]
    categories: Vec<CategoryNode>,
}

pub async fn fetch_category_tree(access_token: &str) -> Result<Vec<CategoryNode>, CategoryFetchError> {
    let client = build_client();
    let url = format!("{}/market/v1/category_tree", *ROOT);
    let response = client
        .get(url)
        .bearer_auth(access_token)
        .send()
        .await
        .map_err(|err| CategoryFetchError::Request(err.to_string()))?;

    if !response.status().is_success() {
        return Err(CategoryFetchError::Request(format!(
            "HTTP {}",
            response.status()
        )));
    }

    response
        .json::<CategoryTreeResponse>()
        .await
        .map(|payload| payload.categories)
        .map_err(|err| CategoryFetchError::Request(err.to_string()))
}

const DEMO_TREE: &[(&str, &str, &str, &[(&str, &str, &str)])] = &[
    (
        "100",
        "Electronics",
        "electronics",
        &[
            ("110", "Phones", "phones"),
            ("120", "Cameras", "cameras"),
            ("130", "Audio", "audio"),
        ],
    ),
    (
        "200",
        "Fashion",
        "fashion",
        &[
            ("210", "Sneakers", "sneakers"),
            ("220", "Watches", "watches"),
        ],
    ),
    (
        "300",
        "Collectibles",
        "collectibles",
        &[
            ("310", "Trading Cards", "trading-cards"),
            ("320", "Vinyl Records", "vinyl-records"),
        ],
    ),
    ("400", "Home & Garden", "home-garden", &[]),
];

/// Deterministic two-level tree used when marketplace networking is disabled.
pub fn demo_tree() -> Vec<CategoryNode> {
    DEMO_TREE
        .iter()
        .map(|(id, name, slug, subs)| CategoryNode {
            id: (*id).to_string(),
            name: (*name).to_string(),
            slug: (*slug).to_string(),
            categories: subs
                .iter()
                .map(|(sid, sname, sslug)| SubcategoryNode {
                    id: (*sid).to_string(),
                    name: (*sname).to_string(),
                    slug: (*sslug).to_string(),
                })
                .collect(),
        })
        .collect()
}
