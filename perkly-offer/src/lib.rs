pub mod eligibility;
pub mod features;
pub mod response;
pub mod service;

pub use eligibility::{EligibilityEvaluator, OfferVerdict};
pub use features::FeatureFlags;
pub use response::assemble;
pub use service::{EligibilityService, ServiceSettings};
