pub mod auth;
pub mod categories;
pub mod config;
pub mod listings;
pub mod uploads;
pub mod watchlist;

pub use categories::{CategoryNode, SubcategoryNode};
pub use listings::{ItemImage, ListingSubmission, PersistedItem};
