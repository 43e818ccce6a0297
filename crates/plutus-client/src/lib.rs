//! Plutus Client - HTTP client for the reference catalog API
//!
//! This crate provides [`PolygonClient`], the reqwest implementation of
//! [`plutus_core::traits::CatalogClient`] for the Polygon `/v3/reference/tickers`
//! endpoint.
//!
//! # Overview
//!
//! The client handles authentication, request building, response parsing,
//! and error classification. Pacing and retries are applied by the core
//! rate limiter that wraps every call.

pub mod polygon;

// Re-export main client types
pub use polygon::PolygonClient;
