//! Workload Module
//!
//! The element registry is the authoritative description of the audit
//! workload. The partitioner turns a snapshot of it, plus any queued
//! pages, into one disjoint share per participant.

pub mod partitioner;
pub mod registry;
