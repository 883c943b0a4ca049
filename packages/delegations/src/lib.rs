mod actions;
pub mod config;
pub mod eligibility;
pub mod error;
pub mod manager;
pub mod poller;
pub mod reconcile;
pub mod scripts;
pub mod store;
pub mod summary;

pub use config::Config;
pub use error::{ActionError, ActionStage, LifecycleError};
pub use manager::{Collaborators, DelegationManager};
pub use reconcile::{DelegationRow, DisplayState, RowOrigin};
