//! The documented end-to-end flows.

#![allow(clippy::unwrap_used)]

use chatshop_core::OrderStatus;
use chatshop_integration_tests::{TestContext, red_mugs};
use chatshop_orders::services::{CustomerResolution, MatchType, OrderError};

#[tokio::test]
async fn test_oversized_order_rejected_then_smaller_order_placed() {
    let ctx = TestContext::new().await;

    let quote = ctx.service.propose(red_mugs(3)).await.unwrap();
    assert!(!quote.signed.confirmation_token.is_empty());

    let err = ctx
        .service
        .place(&quote.signed.confirmation_token, &quote.signed.proposal)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OrderError::InsufficientStock {
            requested: 3,
            available: 2,
            ref sku_code,
        } if sku_code.as_deref() == Some("A0001-RED")
    ));
    assert_eq!(ctx.red_stock().await, Some(2));
    assert_eq!(ctx.store.order_count().await, 0);

    let quote = ctx.service.propose(red_mugs(2)).await.unwrap();
    let order = ctx
        .service
        .place(&quote.signed.confirmation_token, &quote.signed.proposal)
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
    assert!(order.stock_consumed);
    assert_eq!(ctx.red_stock().await, Some(0));
}

#[tokio::test]
async fn test_shared_first_name_needs_confirmation() {
    let ctx = TestContext::new().await;
    ctx.add_two_alis().await;

    let resolution = ctx.service.resolve_customer("علی", None).await.unwrap();
    let CustomerResolution::NeedsConfirmation { candidates } = &resolution else {
        panic!("expected needs_confirmation, got {resolution:?}");
    };
    assert_eq!(candidates.len(), 2);
    assert!(resolution.customer().is_none());

    let json = serde_json::to_value(&resolution).unwrap();
    assert_eq!(json["status"], "needs_confirmation");
    assert_eq!(json["needs_confirmation"], true);
    assert!(json.get("customer").is_none());
    let text = json.to_string();
    assert!(!text.contains("09123330442"));
    assert!(!text.contains("09127770918"));
}

#[tokio::test]
async fn test_phone_suffix_verifier_resolves_one_ali() {
    let ctx = TestContext::new().await;
    let (rezaei, _) = ctx.add_two_alis().await;

    let resolution = ctx
        .service
        .resolve_customer("علی", Some("0442"))
        .await
        .unwrap();
    let CustomerResolution::Resolved {
        customer,
        confidence,
        match_type,
    } = resolution
    else {
        panic!("expected resolved, got {resolution:?}");
    };
    assert_eq!(customer.id, rezaei.id);
    assert_eq!(match_type, MatchType::NameVerified);
    assert!((confidence - 1.0).abs() < f64::EPSILON);
}
