//! Pin domain: the operations behind the `/v1` pins API.

pub mod error;
pub mod hashtags;
pub mod models;
pub mod pagination;
pub mod service;

pub use error::PinsError;
pub use pagination::PageQuery;
pub use service::{PinsResult, PinsService};
