//! Order service: propose, commit and move orders through their lifecycle.
//!
//! ```text
//! propose(request) ──► SignedProposal ──► place(token, proposal)  ──► PENDING (stock taken)
//!                                    └──► create_draft(...)       ──► DRAFT
//! update_status(id, to) ──► transition, stock taken on PENDING, returned on CANCELLED
//! ```
//!
//! `place`, `create_draft` and `update_status` are the only operations that
//! write orders. Replaying a proposal returns the order already created from
//! its nonce.

use std::collections::BTreeMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{info, instrument, warn};

use chatshop_core::{
    AttributeMap, CustomerFieldIssues, CustomerFields, CustomerId, FieldIssue, IssueReason,
    OrderId, OrderStatus,
};

use super::attributes::{self, AttributeCheck};
use super::customers::{CustomerResolution, CustomerResolver, ResolverSettings};
use super::proposal::{OrderProposal, ProposalError, ProposalSigner, SignedProposal};
use super::variants::{self, RankedVariant, VariantResolution};
use crate::models::{Customer, NewOrder, NewOrderItem, Order, Product, StockTarget, Variant};
use crate::session::OrderSession;
use crate::store::{OrderStore, StoreError, new_order_code};

/// Smallest orderable quantity.
const MIN_QUANTITY: i32 = 1;

/// Alternatives returned with `variant_not_found`.
const MAX_ALTERNATIVES: usize = 3;

/// Domain errors of the order service.
///
/// Everything except [`OrderError::Store`] is recoverable by the caller.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Required fields are absent.
    #[error("missing required fields: {}", fields.join(", "))]
    MissingFields {
        /// Missing fields, `attributes.<key>` or `customer.<field>`.
        fields: Vec<String>,
        /// Other problems found in the same request.
        invalid: Vec<FieldIssue>,
    },

    /// Present fields failed their type, range, or enum check.
    #[error("invalid fields: {}", issues.iter().map(|i| i.field.as_str()).collect::<Vec<_>>().join(", "))]
    InvalidFields {
        /// One entry per rejected field.
        issues: Vec<FieldIssue>,
    },

    /// The confirmation token does not match the proposal.
    #[error("confirmation token does not match the proposal")]
    InvalidToken,

    /// The proposal is older than the configured TTL.
    #[error("proposal expired")]
    TokenExpired {
        /// Unix seconds the proposal was issued at.
        issued_at: i64,
        /// Configured TTL.
        ttl_secs: i64,
    },

    /// Not enough stock for the requested quantity.
    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock {
        /// SKU that ran short, `None` for a variant-less product.
        sku_code: Option<String>,
        /// Quantity requested.
        requested: i32,
        /// Quantity on hand.
        available: i32,
    },

    /// No product has this code.
    #[error("product not found: {code}")]
    ProductNotFound {
        /// The requested code.
        code: String,
    },

    /// The product has variants but none with these attributes.
    #[error("no variant of {product_code} matches the requested attributes")]
    VariantNotFound {
        /// Product code.
        product_code: String,
        /// Nearest active variants, best first.
        alternatives: Vec<RankedVariant>,
    },

    /// The requested status is not reachable from the current one.
    #[error("cannot move order from {from} to {to}")]
    InvalidTransition {
        /// Current status.
        from: OrderStatus,
        /// Requested status.
        to: OrderStatus,
    },

    /// No order has this id.
    #[error("order not found: {id}")]
    OrderNotFound {
        /// The requested id.
        id: OrderId,
    },

    /// No customer has this id.
    #[error("customer not found: {id}")]
    CustomerNotFound {
        /// The requested id.
        id: CustomerId,
    },

    /// Infrastructure failure; nothing was committed.
    #[error("store error: {0}")]
    Store(StoreError),
}

impl OrderError {
    /// Stable snake_case identifier of the error kind.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MissingFields { .. } => "missing_fields",
            Self::InvalidFields { .. } => "invalid_fields",
            Self::InvalidToken => "invalid_token",
            Self::TokenExpired { .. } => "token_expired",
            Self::InsufficientStock { .. } => "insufficient_stock",
            Self::ProductNotFound { .. } => "product_not_found",
            Self::VariantNotFound { .. } => "variant_not_found",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::OrderNotFound { .. } => "order_not_found",
            Self::CustomerNotFound { .. } => "customer_not_found",
            Self::Store(_) => "internal_error",
        }
    }

    /// Structured detail for a precise follow-up question.
    #[must_use]
    pub fn detail(&self) -> serde_json::Value {
        match self {
            Self::MissingFields { fields, invalid } => json!({ "fields": fields, "invalid": invalid }),
            Self::InvalidFields { issues } => json!({ "issues": issues }),
            Self::InvalidToken | Self::Store(_) => json!({}),
            Self::TokenExpired {
                issued_at,
                ttl_secs,
            } => json!({ "issued_at": issued_at, "ttl_secs": ttl_secs }),
            Self::InsufficientStock {
                sku_code,
                requested,
                available,
            } => json!({ "sku_code": sku_code, "requested": requested, "available": available }),
            Self::ProductNotFound { code } => json!({ "product_code": code }),
            Self::VariantNotFound {
                product_code,
                alternatives,
            } => json!({ "product_code": product_code, "alternatives": alternatives }),
            Self::InvalidTransition { from, to } => json!({
                "from": from,
                "to": to,
                "allowed": from.next_statuses(),
            }),
            Self::OrderNotFound { id } => json!({ "order_id": id }),
            Self::CustomerNotFound { id } => json!({ "customer_id": id }),
        }
    }
}

impl From<StoreError> for OrderError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InsufficientStock {
                target,
                requested,
                available,
            } => Self::InsufficientStock {
                sku_code: match target {
                    StockTarget::Variant(sku) => Some(sku),
                    StockTarget::Product(_) => None,
                },
                requested,
                available,
            },
            StoreError::InvalidTransition { from, to } => Self::InvalidTransition { from, to },
            StoreError::InvalidQuantity { quantity, .. } => Self::InvalidFields {
                issues: vec![FieldIssue::new(
                    "quantity",
                    IssueReason::QuantityTooLow {
                        value: quantity,
                        min: MIN_QUANTITY,
                    },
                )],
            },
            other => Self::Store(other),
        }
    }
}

impl From<ProposalError> for OrderError {
    fn from(err: ProposalError) -> Self {
        match err {
            ProposalError::Expired {
                issued_at,
                ttl_secs,
            } => Self::TokenExpired {
                issued_at,
                ttl_secs,
            },
            ProposalError::InvalidToken | ProposalError::InvalidKey(_) => Self::InvalidToken,
        }
    }
}

/// Untrusted input for [`OrderService::propose`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProposalRequest {
    /// Product code.
    pub product_code: String,
    /// Units requested.
    pub quantity: i32,
    /// Free-form attributes.
    #[serde(default)]
    pub attributes: AttributeMap,
    /// Free-form customer fields.
    #[serde(default)]
    pub customer: BTreeMap<String, String>,
}

/// A signed proposal with the price the caller will be charged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProposalQuote {
    /// Token and signed payload.
    #[serde(flatten)]
    pub signed: SignedProposal,
    /// Resolved SKU, `None` for a variant-less product.
    pub sku_code: Option<String>,
    /// Unit price at proposal time.
    pub unit_price: Decimal,
    /// `unit_price * quantity`.
    pub total_amount: Decimal,
}

/// What an order line will be sold from.
struct Line {
    sku_code: Option<String>,
    unit_price: Decimal,
}

/// The order commitment service.
#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn OrderStore>,
    signer: ProposalSigner,
    resolver: ResolverSettings,
}

impl OrderService {
    /// Create a service over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn OrderStore>, signer: ProposalSigner, resolver: ResolverSettings) -> Self {
        Self {
            store,
            signer,
            resolver,
        }
    }

    /// The backing store.
    #[must_use]
    pub fn store(&self) -> &dyn OrderStore {
        self.store.as_ref()
    }

    /// Validate a request and sign it.
    ///
    /// Stock is not checked here; `place` checks it under lock.
    ///
    /// # Errors
    ///
    /// - `ProductNotFound` if the code is unknown
    /// - `MissingFields` / `InvalidFields` with every problem found
    /// - `VariantNotFound` with ranked alternatives
    #[instrument(skip_all, fields(product_code = %request.product_code, quantity = request.quantity))]
    pub async fn propose(&self, request: ProposalRequest) -> Result<ProposalQuote, OrderError> {
        let product = self.product(&request.product_code).await?;

        let mut issues = Issues::default();
        issues.quantity(request.quantity);
        issues.attributes(attributes::validate(&product.attribute_schema, &request.attributes));

        let customer = match CustomerFields::from_map(&request.customer) {
            Ok(customer) => Some(customer),
            Err(found) => {
                issues.customer(found);
                None
            }
        };

        issues.into_result()?;
        let Some(customer) = customer else {
            return Err(OrderError::InvalidFields { issues: Vec::new() });
        };

        let line = self.line_for(&product, &request.attributes).await?;
        let total_amount = line.unit_price * Decimal::from(request.quantity);

        let signed = self.signer.issue(
            product.code.clone(),
            request.quantity,
            request.attributes,
            customer,
        );

        info!(
            nonce = %signed.proposal.nonce,
            sku_code = line.sku_code.as_deref(),
            "Issued proposal"
        );

        Ok(ProposalQuote {
            signed,
            sku_code: line.sku_code,
            unit_price: line.unit_price,
            total_amount,
        })
    }

    /// Verify a proposal and commit it as a `PENDING` order, taking stock.
    ///
    /// # Errors
    ///
    /// - `InvalidToken` / `TokenExpired` if verification fails
    /// - `InsufficientStock` if stock ran out; nothing is written
    /// - `ProductNotFound` / `VariantNotFound` if the catalog changed
    #[instrument(skip_all, fields(product_code = %proposal.product_code, nonce = %proposal.nonce))]
    pub async fn place(&self, token: &str, proposal: &OrderProposal) -> Result<Order, OrderError> {
        self.commit(token, proposal, OrderStatus::Pending).await
    }

    /// Verify a proposal and record it as a `DRAFT` order without taking stock.
    ///
    /// # Errors
    ///
    /// Same as [`Self::place`], except stock is not checked.
    #[instrument(skip_all, fields(product_code = %proposal.product_code, nonce = %proposal.nonce))]
    pub async fn create_draft(
        &self,
        token: &str,
        proposal: &OrderProposal,
    ) -> Result<Order, OrderError> {
        self.commit(token, proposal, OrderStatus::Draft).await
    }

    async fn commit(
        &self,
        token: &str,
        proposal: &OrderProposal,
        status: OrderStatus,
    ) -> Result<Order, OrderError> {
        self.signer.verify(token, proposal)?;

        if let Some(existing) = self.store.order_by_nonce(&proposal.nonce).await? {
            warn!(order_id = %existing.id, "Proposal replayed, returning existing order");
            return Ok(existing);
        }

        let product = self.product(&proposal.product_code).await?;

        // A valid signature only proves who built the payload
        let mut issues = Issues::default();
        issues.quantity(proposal.quantity);
        issues.attributes(attributes::validate(&product.attribute_schema, &proposal.attributes));
        issues.customer(proposal.customer.issues());
        issues.into_result()?;

        let line = self.line_for(&product, &proposal.attributes).await?;
        let customer_id = self
            .store
            .customer_by_phone(&proposal.customer.phone)
            .await?
            .map(|c| c.id);

        let order = NewOrder {
            order_code: new_order_code(),
            status,
            customer_id,
            customer_snapshot: proposal.customer.clone(),
            total_amount: line.unit_price * Decimal::from(proposal.quantity),
            proposal_nonce: Some(proposal.nonce.clone()),
            items: vec![NewOrderItem {
                product_id: product.id,
                sku_code: line.sku_code,
                quantity: proposal.quantity,
                unit_price: line.unit_price,
                attributes: proposal.attributes.clone(),
            }],
        };

        match self.store.insert_order(order).await {
            Ok(order) => {
                info!(
                    order_id = %order.id,
                    order_code = %order.order_code,
                    status = %order.status,
                    "Order committed"
                );
                Ok(order)
            }
            Err(StoreError::DuplicateProposal) => {
                // Lost a race with a concurrent replay
                let existing = self
                    .store
                    .order_by_nonce(&proposal.nonce)
                    .await?
                    .ok_or(OrderError::Store(StoreError::NotFound))?;
                warn!(order_id = %existing.id, "Proposal replayed concurrently");
                Ok(existing)
            }
            Err(e @ StoreError::InsufficientStock { .. }) => {
                // A concurrent replay may have taken the stock for this very proposal
                if let Some(existing) = self.store.order_by_nonce(&proposal.nonce).await? {
                    warn!(order_id = %existing.id, "Proposal replayed concurrently");
                    return Ok(existing);
                }
                info!(error = %e, "Order rejected for stock");
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Move an order to `to`.
    ///
    /// # Errors
    ///
    /// - `OrderNotFound` if the id is unknown
    /// - `InvalidTransition` if `to` is not reachable; nothing changes
    /// - `InsufficientStock` when entering `PENDING` without stock
    #[instrument(skip(self), fields(order_id = %order_id, to = %to))]
    pub async fn update_status(&self, order_id: OrderId, to: OrderStatus) -> Result<Order, OrderError> {
        match self.store.transition_order(order_id, to).await {
            Ok(order) => {
                info!(stock_consumed = order.stock_consumed, "Order status updated");
                Ok(order)
            }
            Err(StoreError::NotFound) => Err(OrderError::OrderNotFound { id: order_id }),
            Err(e) => Err(e.into()),
        }
    }

    /// Read an order.
    ///
    /// # Errors
    ///
    /// Returns `OrderNotFound` if the id is unknown.
    pub async fn order(&self, order_id: OrderId) -> Result<Order, OrderError> {
        self.store
            .order_by_id(order_id)
            .await?
            .ok_or(OrderError::OrderNotFound { id: order_id })
    }

    /// Resolve an identity query to a customer.
    ///
    /// # Errors
    ///
    /// Returns `Store` if the store cannot be read.
    pub async fn resolve_customer(
        &self,
        query: &str,
        verifier: Option<&str>,
    ) -> Result<CustomerResolution, OrderError> {
        let resolver = CustomerResolver::new(self.store.as_ref(), self.resolver);
        Ok(resolver.resolve(query, verifier).await?)
    }

    /// Complete a disambiguation by internal id.
    ///
    /// # Errors
    ///
    /// Returns `CustomerNotFound` if the id is unknown.
    pub async fn select_customer(&self, id: CustomerId) -> Result<Customer, OrderError> {
        let resolver = CustomerResolver::new(self.store.as_ref(), self.resolver);
        resolver
            .select_by_id(id)
            .await?
            .ok_or(OrderError::CustomerNotFound { id })
    }

    /// Active variants of a product.
    ///
    /// # Errors
    ///
    /// Returns `ProductNotFound` if the code is unknown.
    pub async fn list_variants(&self, product_code: &str) -> Result<Vec<Variant>, OrderError> {
        let product = self.product(product_code).await?;
        Ok(variants::active_variants(self.store.as_ref(), &product).await?)
    }

    /// Resolve attributes against a product's variants.
    ///
    /// # Errors
    ///
    /// Returns `ProductNotFound` if the code is unknown.
    pub async fn find_variants(
        &self,
        product_code: &str,
        attributes: &AttributeMap,
    ) -> Result<VariantResolution, OrderError> {
        let product = self.product(product_code).await?;
        Ok(variants::resolve(self.store.as_ref(), &product, attributes).await?)
    }

    /// [`Self::propose`], remembering the signed proposal in `session`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::propose`]; the session is unchanged on error.
    pub async fn propose_in(
        &self,
        session: &mut OrderSession,
        request: ProposalRequest,
    ) -> Result<ProposalQuote, OrderError> {
        let quote = self.propose(request).await?;
        session.pending = Some(quote.signed.clone());
        Ok(quote)
    }

    /// Place the proposal held by `session`.
    ///
    /// Returns `Ok(None)` when nothing is pending. On success the pending
    /// proposal is cleared and the order and customer are remembered.
    ///
    /// # Errors
    ///
    /// Same as [`Self::place`]; the proposal stays pending on error.
    pub async fn place_pending(&self, session: &mut OrderSession) -> Result<Option<Order>, OrderError> {
        let Some(pending) = session.pending.as_ref() else {
            return Ok(None);
        };
        let order = self
            .place(&pending.confirmation_token, &pending.proposal)
            .await?;
        session.pending = None;
        session.last_order_id = Some(order.id);
        if order.customer_id.is_some() {
            session.last_customer_id = order.customer_id;
        }
        Ok(Some(order))
    }

    /// [`Self::resolve_customer`], remembering a resolved customer in `session`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::resolve_customer`].
    pub async fn resolve_customer_in(
        &self,
        session: &mut OrderSession,
        query: &str,
        verifier: Option<&str>,
    ) -> Result<CustomerResolution, OrderError> {
        let resolution = self.resolve_customer(query, verifier).await?;
        if let Some(customer) = resolution.customer() {
            session.last_customer_id = Some(customer.id);
        }
        Ok(resolution)
    }

    async fn product(&self, code: &str) -> Result<Product, OrderError> {
        let code = code.trim();
        self.store
            .product_by_code(code)
            .await?
            .ok_or_else(|| OrderError::ProductNotFound {
                code: code.to_owned(),
            })
    }

    async fn line_for(&self, product: &Product, attributes: &AttributeMap) -> Result<Line, OrderError> {
        let resolution = variants::resolve(self.store.as_ref(), product, attributes).await?;
        if resolution.is_variantless() {
            return Ok(Line {
                sku_code: None,
                unit_price: product.price,
            });
        }

        match resolution.exact {
            Some(variant) => Ok(Line {
                unit_price: variant.unit_price(product),
                sku_code: Some(variant.sku_code),
            }),
            None => Err(OrderError::VariantNotFound {
                product_code: product.code.clone(),
                alternatives: resolution
                    .ranked
                    .into_iter()
                    .take(MAX_ALTERNATIVES)
                    .collect(),
            }),
        }
    }
}

/// Problems collected across quantity, attributes and customer fields.
#[derive(Default)]
struct Issues {
    missing: Vec<String>,
    invalid: Vec<FieldIssue>,
}

impl Issues {
    fn quantity(&mut self, quantity: i32) {
        if quantity < MIN_QUANTITY {
            self.invalid.push(FieldIssue::new(
                "quantity",
                IssueReason::QuantityTooLow {
                    value: quantity,
                    min: MIN_QUANTITY,
                },
            ));
        }
    }

    fn attributes(&mut self, check: AttributeCheck) {
        self.prefixed("attributes", check.missing, check.invalid);
    }

    fn customer(&mut self, found: CustomerFieldIssues) {
        self.prefixed("customer", found.missing, found.invalid);
    }

    fn prefixed(&mut self, prefix: &str, missing: Vec<String>, invalid: Vec<FieldIssue>) {
        self.missing
            .extend(missing.into_iter().map(|f| format!("{prefix}.{f}")));
        self.invalid.extend(invalid.into_iter().map(|mut i| {
            i.field = format!("{prefix}.{}", i.field);
            i
        }));
    }

    /// `MissingFields` wins over `InvalidFields`; both carry everything found.
    fn into_result(self) -> Result<(), OrderError> {
        if !self.missing.is_empty() {
            return Err(OrderError::MissingFields {
                fields: self.missing,
                invalid: self.invalid,
            });
        }
        if !self.invalid.is_empty() {
            return Err(OrderError::InvalidFields {
                issues: self.invalid,
            });
        }
        Ok(())
    }
}
