//! Storefront Payments - checkout and post-payment reconciliation
//!
//! This crate opens checkout sessions with Stripe and Datatrans, reconciles
//! their signed webhooks into a single payment state machine per order, and
//! runs the post-payment side effects (confirmation e-mails and the Infoniqa
//! ledger sync) exactly once per order through an idempotent retry queue.

pub mod adapters;
pub mod application;
pub mod bootstrap;
pub mod config;
pub mod domain;
pub mod ports;
