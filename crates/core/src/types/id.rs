//! Row ids.
//!
//! Each table gets its own id type so a `CustomerId` can never be passed
//! where an `OrderId` is expected. These are internal row ids; callers see
//! `order_code` and `customer_code`, except for candidate selection, which
//! takes the internal customer id.

/// Declare an `i32` row id, stored as `INTEGER` under the `postgres` feature.
macro_rules! row_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        #[cfg_attr(feature = "postgres", derive(::sqlx::Type))]
        #[cfg_attr(feature = "postgres", sqlx(transparent))]
        pub struct $name(i32);

        impl $name {
            /// Wrap a raw row id.
            #[must_use]
            pub const fn new(id: i32) -> Self {
                Self(id)
            }

            /// The raw row id.
            #[must_use]
            pub const fn as_i32(&self) -> i32 {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

row_id!(
    /// A catalog product.
    ProductId
);
row_id!(
    /// A sellable variant of a product.
    VariantId
);
row_id!(
    /// A customer record. Also the handle accepted for candidate selection.
    CustomerId
);
row_id!(
    /// A committed order.
    OrderId
);
row_id!(
    /// One line of an order.
    OrderItemId
);
