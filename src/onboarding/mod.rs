//! Onboarding: the guided questionnaire that seeds a user's net worth.
//!
//! Answers to the fixed question sequence expand into data-entry tasks; each
//! completed task becomes an asset or liability on the backend. The
//! question table and expansion rules are pure (`questions`, `engine`);
//! `OnboardingStore` holds the live state and talks to the backend.

pub mod engine;
pub mod model;
pub mod questions;
pub mod store;

pub use model::{
    Answer, AnswerRecord, DataEntryTask, HouseholdType, OnboardingState, OnboardingStatus,
    Progress,
};
pub use questions::{EntityKind, QuestionId, QuestionKind};
pub use store::{AnswerOutcome, OnboardingStore};
