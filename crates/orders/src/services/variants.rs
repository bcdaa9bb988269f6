//! Variant resolution.
//!
//! Maps a product and an attribute map to a concrete SKU. The exact match
//! goes through the attribute hash index; alternatives are ranked by the
//! share of requested key/value pairs each active variant holds. Read-only.

use serde::Serialize;
use tracing::{debug, instrument};

use chatshop_core::AttributeMap;

use crate::models::{Product, Variant};
use crate::store::{OrderStore, StoreError};

/// A variant with its similarity to the requested attributes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedVariant {
    /// The candidate variant.
    #[serde(flatten)]
    pub variant: Variant,
    /// Matching pairs over requested pairs, in `0.0..=1.0`.
    pub score: f64,
}

/// Result of resolving attributes against a product's variants.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VariantResolution {
    /// Active variant whose attributes equal the request.
    pub exact: Option<Variant>,
    /// Active variants, best first; ties broken by SKU.
    pub ranked: Vec<RankedVariant>,
    /// Whether the product has variant rows, active or not.
    #[serde(skip)]
    pub has_variants: bool,
}

impl VariantResolution {
    /// Whether the product is sold from its own stock.
    ///
    /// False as soon as any variant row exists, even if every one is
    /// inactive.
    #[must_use]
    pub const fn is_variantless(&self) -> bool {
        !self.has_variants
    }
}

/// Resolve `attributes` to a variant of `product`.
///
/// Products without variant rows return an empty resolution; the caller
/// then sells the product's own stock. Products whose variants are all
/// inactive return an empty resolution that is not variant-less.
///
/// # Errors
///
/// Returns `StoreError` if the store cannot be read.
#[instrument(skip(store, product, attributes), fields(product_code = %product.code))]
pub async fn resolve(
    store: &dyn OrderStore,
    product: &Product,
    attributes: &AttributeMap,
) -> Result<VariantResolution, StoreError> {
    let all = store.variants_of(product.id).await?;
    if all.is_empty() {
        return Ok(VariantResolution::default());
    }
    let active = only_active(all);
    if active.is_empty() {
        debug!("Every variant is inactive");
        return Ok(VariantResolution {
            has_variants: true,
            ..VariantResolution::default()
        });
    }

    let exact = store
        .active_variant_by_hash(product.id, &attributes.content_hash())
        .await?;
    let ranked = rank(active, attributes);

    debug!(
        exact = exact.as_ref().map(|v| v.sku_code.as_str()),
        candidates = ranked.len(),
        "Resolved variant"
    );

    Ok(VariantResolution {
        exact,
        ranked,
        has_variants: true,
    })
}

/// Active variants of `product`, ordered by SKU.
///
/// # Errors
///
/// Returns `StoreError` if the store cannot be read.
pub async fn active_variants(
    store: &dyn OrderStore,
    product: &Product,
) -> Result<Vec<Variant>, StoreError> {
    Ok(only_active(store.variants_of(product.id).await?))
}

fn only_active(variants: Vec<Variant>) -> Vec<Variant> {
    let mut active: Vec<Variant> = variants.into_iter().filter(|v| v.is_active).collect();
    active.sort_by(|a, b| a.sku_code.cmp(&b.sku_code));
    active
}

/// Score and order variants against `requested`.
#[must_use]
pub fn rank(variants: Vec<Variant>, requested: &AttributeMap) -> Vec<RankedVariant> {
    let mut ranked: Vec<RankedVariant> = variants
        .into_iter()
        .map(|variant| RankedVariant {
            score: similarity(requested, &variant.attributes),
            variant,
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.variant.sku_code.cmp(&b.variant.sku_code))
    });
    ranked
}

/// Share of requested pairs that `candidate` holds with the same value.
#[must_use]
pub fn similarity(requested: &AttributeMap, candidate: &AttributeMap) -> f64 {
    let total = u32::try_from(requested.len()).unwrap_or(u32::MAX);
    if total == 0 {
        return 0.0;
    }
    let matched = u32::try_from(requested.matching_pairs(candidate)).unwrap_or(u32::MAX);
    f64::from(matched) / f64::from(total)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chatshop_core::{AttributeSchema, ProductId, VariantId};
    use rust_decimal::Decimal;

    use super::*;
    use crate::store::MemoryStore;

    fn variant(sku: &str, attrs: &[(&str, &str)]) -> Variant {
        let attributes = AttributeMap::from_pairs(attrs.iter().copied());
        Variant {
            id: VariantId::new(1),
            product_id: ProductId::new(1),
            sku_code: sku.to_owned(),
            attributes_hash: attributes.content_hash(),
            attributes,
            price_override: None,
            stock_qty: 1,
            is_active: true,
        }
    }

    #[test]
    fn test_similarity_pairs_not_keys() {
        let requested = AttributeMap::from_pairs([("color", "red"), ("size", "42")]);
        let same_keys = AttributeMap::from_pairs([("color", "black"), ("size", "43")]);
        assert!(similarity(&requested, &same_keys).abs() < f64::EPSILON);
        let half = AttributeMap::from_pairs([("color", "red"), ("size", "43")]);
        assert!((similarity(&requested, &half) - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rank_orders_by_score_then_sku() {
        let requested = AttributeMap::from_pairs([("color", "red"), ("size", "42")]);
        let ranked = rank(
            vec![
                variant("C", &[("color", "red"), ("size", "43")]),
                variant("B", &[("color", "black"), ("size", "42")]),
                variant("A", &[("color", "black"), ("size", "40")]),
                variant("D", &[("color", "red"), ("size", "42")]),
            ],
            &requested,
        );
        let skus: Vec<_> = ranked.iter().map(|r| r.variant.sku_code.as_str()).collect();
        assert_eq!(skus, vec!["D", "B", "C", "A"]);
    }

    #[tokio::test]
    async fn test_resolve_exact_is_deterministic() {
        let store = MemoryStore::new();
        let product = store
            .add_product("A0001", "Mug", Decimal::TEN, 0, AttributeSchema::default())
            .await;
        store
            .add_variant(
                product.id,
                "A0001-RED",
                AttributeMap::from_pairs([("color", "red")]),
                None,
                2,
            )
            .await;
        store
            .add_variant(
                product.id,
                "A0001-BLACK",
                AttributeMap::from_pairs([("color", "black")]),
                None,
                2,
            )
            .await;

        let attrs = AttributeMap::from_pairs([(" Color", "red ")]);
        let first = resolve(&store, &product, &attrs).await.unwrap();
        let second = resolve(&store, &product, &attrs).await.unwrap();
        assert_eq!(first.exact.as_ref().unwrap().sku_code, "A0001-RED");
        assert_eq!(first.exact, second.exact);
        assert_eq!(first.ranked.len(), 2);
    }

    #[tokio::test]
    async fn test_resolve_skips_inactive() {
        let store = MemoryStore::new();
        let product = store
            .add_product("A0002", "Cap", Decimal::TEN, 0, AttributeSchema::default())
            .await;
        store
            .add_variant(
                product.id,
                "A0002-RED",
                AttributeMap::from_pairs([("color", "red")]),
                None,
                2,
            )
            .await;
        store.set_variant_active("A0002-RED", false).await;

        let resolution = resolve(&store, &product, &AttributeMap::from_pairs([("color", "red")]))
            .await
            .unwrap();
        assert!(resolution.exact.is_none());
        assert!(resolution.ranked.is_empty());
        assert!(!resolution.is_variantless());
    }

    #[tokio::test]
    async fn test_resolve_variantless_product() {
        let store = MemoryStore::new();
        let product = store
            .add_product("B0001", "Poster", Decimal::ONE, 5, AttributeSchema::default())
            .await;
        let resolution = resolve(&store, &product, &AttributeMap::new()).await.unwrap();
        assert!(resolution.exact.is_none());
        assert!(resolution.ranked.is_empty());
        assert!(resolution.is_variantless());
    }
}
