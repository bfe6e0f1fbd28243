pub mod derivation;
pub mod projector;

pub use derivation::{is_overdue, item_status, plan_status, rederive_items, settled_status};
pub use projector::StatusProjector;
