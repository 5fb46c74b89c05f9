//! Onboarding orchestration for cross-border investing.
//!
//! The crate wires three external providers (Sumsub for KYC, Wise for FX and
//! funding, DriveWealth for brokerage) behind async traits, persists the
//! resulting entities through [`store::EntityStore`], and exposes the flows as
//! an axum router under [`workflows::onboarding`].

pub mod config;
pub mod error;
pub mod integrations;
pub mod store;
pub mod telemetry;
pub mod workflows;
