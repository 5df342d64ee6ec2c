//! Opportunity listing for signed-in members and the data-service client
//! shared with the intake wizard.

pub mod listing;
pub mod router;
pub mod store;

pub use listing::{
    available_niches, relative_age, results_summary, NicheFilter, OpportunityFilter,
    PublicOpportunity,
};
pub use router::marketplace_router;
pub use store::{OpportunityStore, RestOpportunityStore, StoreError};
