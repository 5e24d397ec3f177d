//! Escalation: resources, response modifications and human review.

pub mod manager;
pub mod resources;
pub mod review;

pub use manager::{EscalationDecision, EscalationEvent, EscalationManager, ResponseModifications};
pub use resources::{EmergencyResource, EmergencyResourceResolver, JurisdictionResources, ResourceType};
pub use review::{ReviewPriority, ReviewQueue, ReviewStatus, ReviewTicket};
