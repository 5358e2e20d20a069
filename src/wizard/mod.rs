pub mod attributes;
pub mod controller;
pub mod draft;
pub mod media;
pub mod optimistic;
pub mod price;
pub mod resolver;

pub use controller::{StepWizard, WizardPhase};
pub use draft::DraftState;
pub use media::UploadedImage;
