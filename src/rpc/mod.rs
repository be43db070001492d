//! Remote-Call Module
//!
//! HTTP+JSON transport between grid nodes.
//!
//! ## Submodules
//! - **`protocol`**: endpoint paths and DTOs.
//! - **`client`**: outgoing calls with bounded retry.
//! - **`handlers`**: axum handlers and the node router.

pub mod client;
pub mod handlers;
pub mod protocol;
