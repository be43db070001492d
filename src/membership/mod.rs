//! Membership Module
//!
//! Who this process is in the grid and who works for it.
//!
//! ## Core Mechanisms
//! - **Role Guard**: `solo → master` promotion (one-way, idempotent) and
//!   `solo → slave` acceptance, mutually exclusive. The master token exists
//!   exactly while the role is master.
//! - **Access Control**: privileged report calls must present the master
//!   token; solo and slave processes let local callers through.
//! - **Enrollment**: validates an offered instance, pushes scan options to
//!   it, makes this node its master and only then adds it to the roster.
//! - **Broker Acquisition**: aggregated (sequential, by pipe id) or balanced
//!   (concurrent, joined on a countdown latch) strategies.

pub mod broker;
pub mod enrollment;
pub mod guard;
pub mod latch;
pub mod roster;
pub mod types;

#[cfg(test)]
mod tests;
