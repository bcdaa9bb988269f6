//! Integration tests for chatshop.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p chatshop-integration-tests
//! ```
//!
//! Every test drives [`OrderService`] over a fresh [`MemoryStore`]; no
//! database or running server is needed.
//!
//! # Test Categories
//!
//! - `scenarios` - The documented end-to-end flows
//! - `inventory` - Concurrent placement and lifecycle stock effects
//! - `proposals` - Token integrity, expiry and replay
//! - `customers` - Identity resolution and masking

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::collections::BTreeMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use secrecy::SecretString;

use chatshop_core::{AttributeKind, AttributeMap, AttributeSchema, AttributeSpec, Phone};
use chatshop_orders::models::{Customer, Product, StockTarget};
use chatshop_orders::services::{OrderService, ProposalRequest, ProposalSigner, ResolverSettings};
use chatshop_orders::store::MemoryStore;

/// Signing key shared by every fixture.
pub const TEST_PROPOSAL_KEY: &str = "itest-proposal-key-Vb7Qm2Lx9Rz4Wp8K";

/// Proposal TTL used by the fixtures.
pub const TEST_TTL_SECS: i64 = 1800;

/// A service over a seeded in-memory store.
pub struct TestContext {
    /// Service under test.
    pub service: OrderService,
    /// Direct handle for stock assertions and extra seeding.
    pub store: Arc<MemoryStore>,
    /// `A0001`: required `color` enum, sold through variants.
    pub mug: Product,
}

impl TestContext {
    /// Catalog with `A0001` and variant `A0001-RED` holding `red_stock` units.
    ///
    /// # Panics
    ///
    /// Panics if the fixture signing key is rejected.
    pub async fn with_red_stock(red_stock: i32) -> Self {
        let store = Arc::new(MemoryStore::new());
        let mug = store
            .add_product("A0001", "Mug", Decimal::from(120), 0, color_schema())
            .await;
        store
            .add_variant(
                mug.id,
                "A0001-RED",
                AttributeMap::from_pairs([("color", "red")]),
                None,
                red_stock,
            )
            .await;

        let service = OrderService::new(store.clone(), signer(), ResolverSettings::default());
        Self {
            service,
            store,
            mug,
        }
    }

    /// The documented catalog: `A0001-RED` with two units.
    pub async fn new() -> Self {
        Self::with_red_stock(2).await
    }

    /// Units left of `A0001-RED`.
    pub async fn red_stock(&self) -> Option<i32> {
        self.store
            .stock_of(&StockTarget::Variant("A0001-RED".to_owned()))
            .await
    }

    /// Add the two customers named علی; the first one's phone ends in 0442.
    ///
    /// # Panics
    ///
    /// Panics if a fixture phone fails to parse.
    pub async fn add_two_alis(&self) -> (Customer, Customer) {
        let rezaei = self
            .store
            .add_customer(
                "علی",
                "رضایی",
                phone("09123330442"),
                "تهران",
                "1234567890",
                "CUST-1001",
            )
            .await;
        let rahimi = self
            .store
            .add_customer(
                "علی",
                "رحیمی",
                phone("09127770918"),
                "اصفهان",
                "8134567890",
                "CUST-1002",
            )
            .await;
        (rezaei, rahimi)
    }
}

/// Signer keyed with [`TEST_PROPOSAL_KEY`].
///
/// # Panics
///
/// Panics if the key is rejected.
#[must_use]
#[allow(clippy::unwrap_used)]
pub fn signer() -> ProposalSigner {
    ProposalSigner::new(&SecretString::from(TEST_PROPOSAL_KEY.to_owned()), TEST_TTL_SECS).unwrap()
}

/// Schema with a required `color` of red or black.
#[must_use]
pub fn color_schema() -> AttributeSchema {
    AttributeSchema::new(vec![AttributeSpec {
        key: "color".to_owned(),
        title: "Color".to_owned(),
        required: true,
        kind: AttributeKind::Enum {
            allowed_values: vec!["red".to_owned(), "black".to_owned()],
        },
    }])
}

/// A valid set of customer fields.
#[must_use]
pub fn customer_fields() -> BTreeMap<String, String> {
    [
        ("first_name", "سارا"),
        ("last_name", "احمدی"),
        ("phone", "۰۹۱۲۱۱۱۲۲۳۳"),
        ("address", "شیراز، بلوار زند"),
        ("postal_code", "۷۱۳۴۵۶۷۸۹۰"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_owned(), v.to_owned()))
    .collect()
}

/// A request for `quantity` red mugs.
#[must_use]
pub fn red_mugs(quantity: i32) -> ProposalRequest {
    ProposalRequest {
        product_code: "A0001".to_owned(),
        quantity,
        attributes: AttributeMap::from_pairs([("color", "red")]),
        customer: customer_fields(),
    }
}

#[allow(clippy::unwrap_used)]
fn phone(raw: &str) -> Phone {
    Phone::parse(raw).unwrap()
}
