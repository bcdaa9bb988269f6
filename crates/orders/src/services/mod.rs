//! Order services.
//!
//! # Services
//!
//! - `attributes` - Attribute schema validation (pure)
//! - `variants` - Attribute map to SKU resolution and ranking
//! - `customers` - Identity resolution with masked disambiguation
//! - `proposal` - Signed proposals and confirmation tokens
//! - `orders` - Proposal, placement and lifecycle transitions

pub mod attributes;
pub mod customers;
pub mod orders;
pub mod proposal;
pub mod variants;

pub use attributes::{AttributeCheck, validate};
pub use customers::{
    CustomerResolution, CustomerResolver, MaskedCandidate, MatchType, ResolverSettings,
};
pub use orders::{OrderError, OrderService, ProposalQuote, ProposalRequest};
pub use proposal::{OrderProposal, ProposalError, ProposalSigner, SignedProposal};
pub use variants::{RankedVariant, VariantResolution};
