pub mod pricing;
pub mod rules;

pub use pricing::{NightlyRate, PricingEngine, PricingError, Quote};
pub use rules::{PricingRuleDraft, PricingRuleService};
