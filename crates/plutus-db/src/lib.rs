//! Plutus DB - Database repository layer for PostgreSQL
//!
//! This crate provides the repository pattern for instrument persistence.
//!
//! # Overview
//!
//! The main component is [`InstrumentRepository`], which implements
//! [`plutus_core::traits::InstrumentStore`] on a single `tickers` table keyed
//! on `ticker`.

mod repository;

pub use repository::InstrumentRepository;
