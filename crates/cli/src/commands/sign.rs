//! Sign a proposal by hand.
//!
//! Prints the confirmation token the service would issue for a proposal, so
//! `POST /orders` can be exercised with crafted payloads.
//!
//! ```bash
//! chatshop sign --proposal '{"product_code":"A0001","quantity":1,...}'
//! ```

use chatshop_orders::config::get_proposal_secret;
use chatshop_orders::services::{OrderProposal, ProposalSigner};

use super::CommandError;

/// TTL is irrelevant for signing; verification applies the server's own.
const SIGNING_TTL_SECS: i64 = 1800;

/// Compute the confirmation token for `proposal_json`.
///
/// # Errors
///
/// Returns `CommandError` if `ORDERS_PROPOSAL_SECRET` is missing or insecure,
/// or the JSON is not a proposal.
pub fn token(proposal_json: &str) -> Result<String, CommandError> {
    dotenvy::dotenv().ok();

    let secret = get_proposal_secret()?;
    let signer = ProposalSigner::new(&secret, SIGNING_TTL_SECS)?;
    let proposal = parse(proposal_json)?;
    Ok(signer.sign(&proposal))
}

fn parse(proposal_json: &str) -> Result<OrderProposal, CommandError> {
    serde_json::from_str(proposal_json).map_err(|e| CommandError::InvalidProposal(e.to_string()))
}
