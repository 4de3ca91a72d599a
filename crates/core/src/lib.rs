//! Core data types for the nomos rule engine.
//!
//! These types are the decoded form of opaque ledger payloads: model
//! records (acts, facts, duties) and the expression trees inside them.
//! Evaluation lives in `nomos-engine`; this crate only decodes.

pub mod error;
pub mod expression;
pub mod model;

pub use error::ModelError;
pub use expression::{Expression, LiteralValue, ANYONE};
pub use model::{ActDecl, DutyDecl, FactDecl, FactFunction};
