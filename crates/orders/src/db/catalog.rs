//! Catalog reads, plus upserts used by the seed command.

use rust_decimal::Decimal;
use sqlx::PgPool;
use sqlx::types::Json;

use chatshop_core::{AttributeMap, AttributeSchema, ProductId, VariantId};

use crate::models::{Product, Variant};
use crate::store::StoreError;

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i32,
    code: String,
    title: String,
    price: Decimal,
    stock_qty: i32,
    attribute_schema: Json<AttributeSchema>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: ProductId::new(row.id),
            code: row.code,
            title: row.title,
            price: row.price,
            stock_qty: row.stock_qty,
            attribute_schema: row.attribute_schema.0,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct VariantRow {
    id: i32,
    product_id: i32,
    sku_code: String,
    attributes: Json<AttributeMap>,
    attributes_hash: String,
    price_override: Option<Decimal>,
    stock_qty: i32,
    is_active: bool,
}

impl From<VariantRow> for Variant {
    fn from(row: VariantRow) -> Self {
        Self {
            id: VariantId::new(row.id),
            product_id: ProductId::new(row.product_id),
            sku_code: row.sku_code,
            attributes: row.attributes.0,
            attributes_hash: row.attributes_hash,
            price_override: row.price_override,
            stock_qty: row.stock_qty,
            is_active: row.is_active,
        }
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for catalog database operations.
pub struct CatalogRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CatalogRepository<'a> {
    /// Create a new catalog repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a product by code.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the query fails.
    pub async fn product_by_code(&self, code: &str) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, code, title, price, stock_qty, attribute_schema
            FROM product
            WHERE code = $1
            ",
        )
        .bind(code)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// List all variants of a product ordered by SKU.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the query fails.
    pub async fn variants_of(&self, product_id: ProductId) -> Result<Vec<Variant>, StoreError> {
        let rows = sqlx::query_as::<_, VariantRow>(
            r"
            SELECT id, product_id, sku_code, attributes, attributes_hash,
                   price_override, stock_qty, is_active
            FROM variant
            WHERE product_id = $1
            ORDER BY sku_code
            ",
        )
        .bind(product_id.as_i32())
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get the active variant with an exact attribute hash.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the query fails.
    pub async fn active_variant_by_hash(
        &self,
        product_id: ProductId,
        attributes_hash: &str,
    ) -> Result<Option<Variant>, StoreError> {
        let row = sqlx::query_as::<_, VariantRow>(
            r"
            SELECT id, product_id, sku_code, attributes, attributes_hash,
                   price_override, stock_qty, is_active
            FROM variant
            WHERE product_id = $1 AND attributes_hash = $2 AND is_active
            ",
        )
        .bind(product_id.as_i32())
        .bind(attributes_hash)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Insert a product or update the existing one with the same code.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the query fails.
    pub async fn upsert_product(
        &self,
        code: &str,
        title: &str,
        price: Decimal,
        stock_qty: i32,
        attribute_schema: &AttributeSchema,
    ) -> Result<Product, StoreError> {
        let row = sqlx::query_as::<_, ProductRow>(
            r"
            INSERT INTO product (code, title, price, stock_qty, attribute_schema)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (code) DO UPDATE
            SET title = EXCLUDED.title,
                price = EXCLUDED.price,
                stock_qty = EXCLUDED.stock_qty,
                attribute_schema = EXCLUDED.attribute_schema,
                updated_at = NOW()
            RETURNING id, code, title, price, stock_qty, attribute_schema
            ",
        )
        .bind(code)
        .bind(title)
        .bind(price)
        .bind(stock_qty)
        .bind(Json(attribute_schema))
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    /// Insert a variant or update the existing one with the same SKU.
    ///
    /// The attribute hash is computed here so it always matches `attributes`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if another active variant of the product
    /// already has these attributes.
    /// Returns `StoreError::Database` for other database errors.
    pub async fn upsert_variant(
        &self,
        product_id: ProductId,
        sku_code: &str,
        attributes: &AttributeMap,
        price_override: Option<Decimal>,
        stock_qty: i32,
    ) -> Result<Variant, StoreError> {
        let row = sqlx::query_as::<_, VariantRow>(
            r"
            INSERT INTO variant (product_id, sku_code, attributes, attributes_hash,
                                 price_override, stock_qty)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (sku_code) DO UPDATE
            SET attributes = EXCLUDED.attributes,
                attributes_hash = EXCLUDED.attributes_hash,
                price_override = EXCLUDED.price_override,
                stock_qty = EXCLUDED.stock_qty,
                is_active = TRUE,
                updated_at = NOW()
            RETURNING id, product_id, sku_code, attributes, attributes_hash,
                      price_override, stock_qty, is_active
            ",
        )
        .bind(product_id.as_i32())
        .bind(sku_code)
        .bind(Json(attributes))
        .bind(attributes.content_hash())
        .bind(price_override)
        .bind(stock_qty)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return StoreError::Conflict(
                    "an active variant with these attributes already exists".to_owned(),
                );
            }
            StoreError::Database(e)
        })?;

        Ok(row.into())
    }
}
