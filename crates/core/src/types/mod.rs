//! Core types for chatshop.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod attribute;
pub mod customer;
pub mod id;
pub mod issue;
pub mod phone;
pub mod status;
pub mod text;

pub use attribute::{AttributeKind, AttributeMap, AttributeSchema, AttributeSpec};
pub use customer::{CustomerFieldIssues, CustomerFields, REQUIRED_CUSTOMER_FIELDS};
pub use id::*;
pub use issue::{FieldIssue, IssueReason};
pub use phone::{Phone, PhoneError};
pub use status::*;
