use crate::market::listings::ListingSubmission;
use crate::wizard::attributes;
use crate::wizard::draft::{Condition, DraftState, MAX_STEP};
use crate::wizard::price::{decimal_cmp, is_positive_decimal};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardPhase {
    Step1,
    Step2,
    Step3,
    Submitting,
    Success,
    Failed,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SubmitReceipt {
    pub id: String,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SubmitError {
    #[error("listing rejected by the marketplace")]
    Rejected { fields: BTreeMap<String, String> },
    #[error("submission request failed: {0}")]
    Request(String),
    #[error("wizard is not on the review step")]
    NotOnReview,
    #[error("a submission is already in flight")]
    InFlight,
    #[error("draft was already submitted")]
    AlreadySubmitted,
}

/// Seam to the marketplace create-or-update endpoint. The live impl lives in
/// `market::listings`; tests substitute a recording double.
#[allow(async_fn_in_trait)]
pub trait ListingBackend {
    async fn create_listing(&self, payload: &ListingSubmission)
    -> Result<SubmitReceipt, SubmitError>;
    async fn update_listing(
        &self,
        item_id: &str,
        payload: &ListingSubmission,
    ) -> Result<SubmitReceipt, SubmitError>;
}

#[derive(Debug, Clone)]
enum Status {
    Editing,
    Submitting,
    // the item id lives on the draft once recorded
    Success,
}

/// Owns step transitions, per-step validation gating, and the final
/// create-or-update submission for one draft.
#[derive(Debug, Clone)]
pub struct StepWizard {
    pub draft: DraftState,
    status: Status,
    last_failure: Option<SubmitError>,
}

impl StepWizard {
    pub fn new(draft: DraftState) -> Self {
        Self {
            draft,
            status: Status::Editing,
            last_failure: None,
        }
    }

    pub fn phase(&self) -> WizardPhase {
        match &self.status {
            Status::Submitting => WizardPhase::Submitting,
            Status::Success => WizardPhase::Success,
            Status::Editing if self.last_failure.is_some() => WizardPhase::Failed,
            Status::Editing => match self.draft.step() {
                1 => WizardPhase::Step1,
                2 => WizardPhase::Step2,
                _ => WizardPhase::Step3,
            },
        }
    }

    pub fn last_failure(&self) -> Option<&SubmitError> {
        self.last_failure.as_ref()
    }

    /// Any edit clears a surfaced submission failure so the phase reads as
    /// the step being edited again.
    pub fn note_edited(&mut self) {
        self.last_failure = None;
    }

    /// Validate the current step and advance. On gate failure the step does
    /// not move and the field errors are recorded on the draft; there is no
    /// partial advance.
    pub fn next(&mut self) -> Result<u8, BTreeMap<String, String>> {
        let errors = match self.draft.step() {
            1 => validate_step1(&self.draft),
            2 => validate_step2(&self.draft),
            _ => BTreeMap::new(),
        };
        if !errors.is_empty() {
            self.draft.field_errors = errors.clone();
            return Err(errors);
        }
        self.draft.field_errors.clear();
        self.last_failure = None;
        let step = self.draft.step();
        if step < MAX_STEP {
            self.draft.set_step(step as i32 + 1);
        }
        Ok(self.draft.step())
    }

    /// Backward transitions are always allowed and never re-validate;
    /// captured data is preserved.
    pub fn back(&mut self) -> u8 {
        let step = self.draft.step();
        if step > 1 {
            self.draft.set_step(step as i32 - 1);
        }
        self.last_failure = None;
        self.draft.step()
    }

    /// Flatten the draft into the single create-or-update payload: internal
    /// fields re-merged into the attributes bag, images in final order, the
    /// category collapsed back to the leaf id that was originally stored.
    pub fn build_submission(&self) -> ListingSubmission {
        let internal = self.draft.internal_fields();
        let reserve = self.draft.auction.reserve_price.trim();
        ListingSubmission {
            title: self.draft.basic.title.clone(),
            description: self.draft.basic.description.clone(),
            category_id: self.draft.leaf_category_id().to_string(),
            condition: self
                .draft
                .basic
                .condition
                .map(Condition::as_str)
                .unwrap_or_default()
                .to_string(),
            attributes: attributes::merge_attributes(&self.draft.basic.attributes, &internal),
            starting_price: self.draft.auction.starting_price.clone(),
            reserve_price: (!reserve.is_empty()).then(|| reserve.to_string()),
            image_ids: self
                .draft
                .images
                .iter()
                .map(|image| image.id.clone())
                .collect(),
        }
    }

    /// Single submission for both entry points: a populated `draft_item_id`
    /// means "update that record", absence means "create". On failure the
    /// wizard returns to the review step with the draft intact so the user
    /// can retry without re-entering anything.
    pub async fn submit<B: ListingBackend>(
        &mut self,
        backend: &B,
    ) -> Result<SubmitReceipt, SubmitError> {
        match self.status {
            Status::Submitting => return Err(SubmitError::InFlight),
            Status::Success => return Err(SubmitError::AlreadySubmitted),
            Status::Editing => {}
        }
        if self.draft.step() != MAX_STEP {
            return Err(SubmitError::NotOnReview);
        }

        let payload = self.build_submission();
        self.status = Status::Submitting;
        self.last_failure = None;

        let result = match self.draft.draft_item_id.clone() {
            Some(item_id) => backend.update_listing(&item_id, &payload).await,
            None => backend.create_listing(&payload).await,
        };

        match result {
            Ok(receipt) => {
                info!(
                    target = "mercury.wizard",
                    item_id = %receipt.id,
                    images = payload.image_ids.len(),
                    "listing submitted"
                );
                self.draft.draft_item_id = Some(receipt.id.clone());
                self.status = Status::Success;
                Ok(receipt)
            }
            Err(err) => {
                warn!(target = "mercury.wizard", error = %err, "listing submission failed");
                self.status = Status::Editing;
                if let SubmitError::Rejected { fields } = &err {
                    self.draft.field_errors = fields.clone();
                }
                self.last_failure = Some(err.clone());
                Err(err)
            }
        }
    }
}

fn validate_step1(draft: &DraftState) -> BTreeMap<String, String> {
    let mut errors = BTreeMap::new();
    if draft.basic.title.trim().is_empty() {
        errors.insert("title".into(), "Title is required".into());
    }
    if draft.basic.description.trim().is_empty() {
        errors.insert("description".into(), "Description is required".into());
    }
    if draft.basic.category_id.is_empty() {
        errors.insert("categoryId".into(), "Choose a category".into());
    }
    if draft.basic.condition.is_none() {
        errors.insert("condition".into(), "Choose a condition".into());
    }
    if draft.images.is_empty() {
        errors.insert("images".into(), "Add at least one photo".into());
    }
    errors
}

fn validate_step2(draft: &DraftState) -> BTreeMap<String, String> {
    let mut errors = BTreeMap::new();
    let starting = draft.auction.starting_price.trim();
    let starting_valid = is_positive_decimal(starting);
    if !starting_valid {
        errors.insert(
            "startingPrice".into(),
            "Enter a starting price above zero".into(),
        );
    }

    let reserve = draft.auction.reserve_price.trim();
    if !reserve.is_empty() {
        if !is_positive_decimal(reserve) {
            errors.insert("reservePrice".into(), "Enter a valid reserve price".into());
        } else if starting_valid
            && decimal_cmp(reserve, starting) == Some(Ordering::Less)
        {
            errors.insert(
                "reservePrice".into(),
                "Reserve must be at least the starting price".into(),
            );
        }
    }

    if draft.auction.duration.is_none() {
        errors.insert("auctionDuration".into(), "Choose an auction duration".into());
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wizard::attributes::AuctionDuration;
    use crate::wizard::draft::{AuctionInfoPatch, BasicDetailsPatch};
    use std::collections::BTreeMap as Map;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    #[derive(Default)]
    struct RecordingBackend {
        creates: AtomicUsize,
        updates: AtomicUsize,
        fail_next: Mutex<Option<SubmitError>>,
        last_payload: Mutex<Option<ListingSubmission>>,
    }

    impl RecordingBackend {
        fn fail_once(&self, err: SubmitError) {
            *self.fail_next.lock().unwrap() = Some(err);
        }

        fn take_failure(&self) -> Option<SubmitError> {
            self.fail_next.lock().unwrap().take()
        }
    }

    impl ListingBackend for RecordingBackend {
        async fn create_listing(
            &self,
            payload: &ListingSubmission,
        ) -> Result<SubmitReceipt, SubmitError> {
            if let Some(err) = self.take_failure() {
                return Err(err);
            }
            self.creates.fetch_add(1, AtomicOrdering::SeqCst);
            *self.last_payload.lock().unwrap() = Some(payload.clone());
            Ok(SubmitReceipt {
                id: "item-created".into(),
            })
        }

        async fn update_listing(
            &self,
            item_id: &str,
            payload: &ListingSubmission,
        ) -> Result<SubmitReceipt, SubmitError> {
            if let Some(err) = self.take_failure() {
                return Err(err);
            }
            self.updates.fetch_add(1, AtomicOrdering::SeqCst);
            *self.last_payload.lock().unwrap() = Some(payload.clone());
            Ok(SubmitReceipt {
                id: item_id.to_string(),
            })
        }
    }

    fn filled_step1(wizard: &mut StepWizard) {
        wizard.draft.patch_basic(BasicDetailsPatch {
            title: Some("Mechanical watch".into()),
            description: Some("Runs well, light wear".into()),
            category_id: Some("220".into()),
            subcategory_id: Some("220".into()),
            condition: Some(crate::wizard::draft::Condition::Used),
            ..Default::default()
        });
        wizard
            .draft
            .add_image("img-1".into(), Map::new());
    }

    fn filled_step2(wizard: &mut StepWizard) {
        wizard.draft.patch_auction(AuctionInfoPatch {
            starting_price: Some("50.00".into()),
            reserve_price: Some("75.00".into()),
            duration: Some(AuctionDuration::Days3),
        });
    }

    fn ready_wizard() -> StepWizard {
        let mut wizard = StepWizard::new(DraftState::new());
        filled_step1(&mut wizard);
        wizard.next().expect("step 1 gate");
        filled_step2(&mut wizard);
        wizard.next().expect("step 2 gate");
        wizard
    }

    #[test]
    fn step1_blocked_without_images_even_with_valid_text() {
        let mut wizard = StepWizard::new(DraftState::new());
        filled_step1(&mut wizard);
        wizard.draft.remove_image("img-1");

        let errors = wizard.next().expect_err("gate should hold");
        assert_eq!(wizard.draft.step(), 1);
        assert_eq!(wizard.phase(), WizardPhase::Step1);
        assert!(errors.contains_key("images"));
        assert!(!errors.contains_key("title"));
    }

    #[test]
    fn step1_surfaces_every_missing_field() {
        let mut wizard = StepWizard::new(DraftState::new());
        let errors = wizard.next().expect_err("empty draft");
        for key in ["title", "description", "categoryId", "condition", "images"] {
            assert!(errors.contains_key(key), "missing error for {key}");
        }
    }

    #[test]
    fn step2_enforces_price_rules() {
        let mut wizard = StepWizard::new(DraftState::new());
        filled_step1(&mut wizard);
        wizard.next().expect("step 1 gate");

        wizard.draft.patch_auction(AuctionInfoPatch {
            starting_price: Some("50.00".into()),
            reserve_price: Some("49.99".into()),
            duration: Some(AuctionDuration::Hours24),
        });
        let errors = wizard.next().expect_err("reserve below starting");
        assert!(errors.contains_key("reservePrice"));

        wizard.draft.patch_auction(AuctionInfoPatch {
            reserve_price: Some("".into()),
            ..Default::default()
        });
        // an empty reserve is simply "no reserve"
        assert_eq!(wizard.next().expect("gate passes"), 3);
    }

    #[test]
    fn back_never_revalidates_and_preserves_data() {
        let mut wizard = ready_wizard();
        // make step 2 invalid after the fact
        wizard.draft.patch_auction(AuctionInfoPatch {
            starting_price: Some("not a price".into()),
            ..Default::default()
        });

        assert_eq!(wizard.back(), 2);
        assert_eq!(wizard.back(), 1);
        assert_eq!(wizard.back(), 1);
        assert_eq!(wizard.draft.basic.title, "Mechanical watch");
    }

    #[tokio::test]
    async fn submit_creates_when_no_item_id_and_records_it() {
        let mut wizard = ready_wizard();
        let backend = RecordingBackend::default();

        let receipt = wizard.submit(&backend).await.expect("submit");
        assert_eq!(receipt.id, "item-created");
        assert_eq!(backend.creates.load(AtomicOrdering::SeqCst), 1);
        assert_eq!(backend.updates.load(AtomicOrdering::SeqCst), 0);
        assert_eq!(wizard.phase(), WizardPhase::Success);
        assert_eq!(wizard.draft.draft_item_id.as_deref(), Some("item-created"));

        let sent = backend.last_payload.lock().unwrap();
        let sent = sent.as_ref().expect("payload captured");
        assert_eq!(sent.category_id, "220");
        assert_eq!(sent.condition, "used");
    }

    #[tokio::test]
    async fn submit_updates_when_item_id_present() {
        let mut wizard = ready_wizard();
        wizard.draft.draft_item_id = Some("item-42".into());
        let backend = RecordingBackend::default();

        let receipt = wizard.submit(&backend).await.expect("submit");
        assert_eq!(receipt.id, "item-42");
        assert_eq!(backend.creates.load(AtomicOrdering::SeqCst), 0);
        assert_eq!(backend.updates.load(AtomicOrdering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retry_after_failure_issues_update_not_second_create() {
        let mut wizard = ready_wizard();
        wizard.draft.draft_item_id = Some("item-42".into());
        let backend = RecordingBackend::default();
        backend.fail_once(SubmitError::Request("boom".into()));

        wizard.submit(&backend).await.expect_err("first attempt fails");
        assert_eq!(wizard.phase(), WizardPhase::Failed);
        // draft intact for retry
        assert_eq!(wizard.draft.basic.title, "Mechanical watch");
        assert_eq!(wizard.draft.step(), 3);

        wizard.submit(&backend).await.expect("retry succeeds");
        assert_eq!(backend.creates.load(AtomicOrdering::SeqCst), 0);
        assert_eq!(backend.updates.load(AtomicOrdering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rejected_submission_surfaces_field_errors() {
        let mut wizard = ready_wizard();
        let backend = RecordingBackend::default();
        let mut fields = Map::new();
        fields.insert("title".to_string(), "Too long".to_string());
        backend.fail_once(SubmitError::Rejected {
            fields: fields.clone(),
        });

        let err = wizard.submit(&backend).await.expect_err("rejected");
        assert_eq!(err, SubmitError::Rejected { fields });
        assert_eq!(
            wizard.draft.field_errors.get("title").map(String::as_str),
            Some("Too long")
        );
        assert_eq!(wizard.phase(), WizardPhase::Failed);

        // editing clears the surfaced failure
        wizard.note_edited();
        assert_eq!(wizard.phase(), WizardPhase::Step3);
    }

    #[tokio::test]
    async fn submit_requires_the_review_step() {
        let mut wizard = StepWizard::new(DraftState::new());
        filled_step1(&mut wizard);
        let backend = RecordingBackend::default();
        assert_eq!(
            wizard.submit(&backend).await.expect_err("not on review"),
            SubmitError::NotOnReview
        );
    }

    #[tokio::test]
    async fn second_submit_after_success_is_refused() {
        let mut wizard = ready_wizard();
        let backend = RecordingBackend::default();
        wizard.submit(&backend).await.expect("submit");
        assert_eq!(
            wizard.submit(&backend).await.expect_err("already done"),
            SubmitError::AlreadySubmitted
        );
        assert_eq!(backend.creates.load(AtomicOrdering::SeqCst), 1);
    }

    #[tokio::test]
    async fn submission_payload_is_fully_flattened() {
        let mut wizard = ready_wizard();
        wizard.draft.patch_basic(BasicDetailsPatch {
            attributes: Some({
                let mut attrs = Map::new();
                attrs.insert("Brand".to_string(), "Aurora".to_string());
                attrs
            }),
            custom_features: Some(vec!["Boxed".to_string()]),
            ..Default::default()
        });
        wizard.draft.add_image("img-2".into(), Map::new());
        wizard
            .draft
            .reorder_images(&["img-2".to_string(), "img-1".to_string()]);

        let payload = wizard.build_submission();
        // leaf id, not the pair
        assert_eq!(payload.category_id, "220");
        assert_eq!(payload.image_ids, vec!["img-2", "img-1"]);
        assert_eq!(payload.reserve_price.as_deref(), Some("75.00"));
        // internal fields re-merged under reserved keys
        assert_eq!(
            payload.attributes.get("_customFeatures").map(String::as_str),
            Some(r#"["Boxed"]"#)
        );
        assert_eq!(
            payload.attributes.get("_auctionDuration").map(String::as_str),
            Some("3d")
        );
        assert_eq!(payload.attributes.get("Brand").map(String::as_str), Some("Aurora"));
    }
}
