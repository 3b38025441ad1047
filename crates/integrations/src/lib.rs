//! Marketing Graph API integration: transport seam, cursor pagination,
//! the cached account client and write requests.

pub mod client;
pub mod mutation;
pub mod pagination;
#[cfg(test)]
pub(crate) mod scripted;
pub mod transport;

pub use client::{CachedPayload, MetaGraphClient};
pub use mutation::{BudgetUpdate, DeliveryStatus, MutationOutcome, StatusUpdate};
pub use transport::{GraphTransport, ReqwestTransport};
