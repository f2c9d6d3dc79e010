//! Core domain modules for siemview.
//!
//! Wire framing and the resilient store client, the event data model,
//! client-side filtering, the repository and service layers, dashboard
//! aggregation and the admin credential check.

pub mod auth;
pub mod client;
pub mod dashboard;
pub mod event_record;
pub mod filter;
pub mod framing;
pub mod repository;
pub mod service;
