//! `grouppool-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod aggregate;
pub mod error;
pub mod id;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use error::{DomainError, DomainResult};
pub use id::{AccountId, LedgerId};

/// Quantity of value in the smallest indivisible unit.
///
/// Unsigned on purpose: a balance can never go below zero.
pub type Amount = u64;
