//! BrAPI v2 REST client.
//!
//! [`BrapiClient`] implements the engine's [`BrapiStore`] trait against a
//! BrAPI v2 server: lookups go through the `/search/{entity}` endpoints
//! (following asynchronous search ids and pagination), creates are batched
//! `POST`s and observation overwrites a single `PUT /observations`.
//!
//! [`BrapiStore`]: reconcile_core::brapi::BrapiStore

pub mod client;
pub mod envelope;
pub mod store;

pub use client::{BrapiClient, BrapiClientError};
