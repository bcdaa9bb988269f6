//! Concurrent placement and lifecycle stock effects.

#![allow(clippy::unwrap_used)]

use chatshop_core::OrderStatus;
use chatshop_integration_tests::{TestContext, red_mugs};
use chatshop_orders::services::OrderError;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_placements_never_oversell() {
    let ctx = TestContext::with_red_stock(5).await;

    let mut quotes = Vec::new();
    for quantity in [1, 2, 1, 3, 2, 1, 1, 2] {
        quotes.push(ctx.service.propose(red_mugs(quantity)).await.unwrap());
    }

    let mut handles = Vec::new();
    for quote in quotes {
        let service = ctx.service.clone();
        handles.push(tokio::spawn(async move {
            let quantity = quote.signed.proposal.quantity;
            let result = service
                .place(&quote.signed.confirmation_token, &quote.signed.proposal)
                .await;
            (quantity, result)
        }));
    }

    let mut consumed = 0;
    for handle in handles {
        let (quantity, result) = handle.await.unwrap();
        match result {
            Ok(order) => {
                assert!(order.stock_consumed);
                consumed += quantity;
            }
            Err(OrderError::InsufficientStock { .. }) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert!(consumed <= 5, "consumed {consumed} of 5");
    assert_eq!(ctx.red_stock().await, Some(5 - consumed));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_replays_create_one_order() {
    let ctx = TestContext::new().await;
    let quote = ctx.service.propose(red_mugs(1)).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let service = ctx.service.clone();
        let signed = quote.signed.clone();
        handles.push(tokio::spawn(async move {
            service
                .place(&signed.confirmation_token, &signed.proposal)
                .await
                .unwrap()
                .id
        }));
    }

    let first = handles.remove(0).await.unwrap();
    for handle in handles {
        assert_eq!(handle.await.unwrap(), first);
    }
    assert_eq!(ctx.store.order_count().await, 1);
    assert_eq!(ctx.red_stock().await, Some(1));
}

#[tokio::test]
async fn test_sold_cancel_restores_and_never_returns_to_pending() {
    let ctx = TestContext::new().await;
    let quote = ctx.service.propose(red_mugs(2)).await.unwrap();
    let order = ctx
        .service
        .place(&quote.signed.confirmation_token, &quote.signed.proposal)
        .await
        .unwrap();
    assert_eq!(ctx.red_stock().await, Some(0));

    ctx.service
        .update_status(order.id, OrderStatus::Approved)
        .await
        .unwrap();
    let sold = ctx
        .service
        .update_status(order.id, OrderStatus::Sold)
        .await
        .unwrap();
    assert_eq!(sold.status, OrderStatus::Sold);
    assert_eq!(ctx.red_stock().await, Some(0));

    let err = ctx
        .service
        .update_status(order.id, OrderStatus::Pending)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OrderError::InvalidTransition {
            from: OrderStatus::Sold,
            to: OrderStatus::Pending,
        }
    ));
    assert_eq!(ctx.red_stock().await, Some(0));

    let cancelled = ctx
        .service
        .update_status(order.id, OrderStatus::Cancelled)
        .await
        .unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert!(!cancelled.stock_consumed);
    assert_eq!(ctx.red_stock().await, Some(2));

    let err = ctx
        .service
        .update_status(order.id, OrderStatus::Cancelled)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "invalid_transition");
    assert_eq!(ctx.red_stock().await, Some(2));
}

#[tokio::test]
async fn test_cancelled_draft_leaves_stock_alone() {
    let ctx = TestContext::new().await;
    let quote = ctx.service.propose(red_mugs(2)).await.unwrap();
    let draft = ctx
        .service
        .create_draft(&quote.signed.confirmation_token, &quote.signed.proposal)
        .await
        .unwrap();
    assert!(!draft.stock_consumed);

    ctx.service
        .update_status(draft.id, OrderStatus::Cancelled)
        .await
        .unwrap();
    assert_eq!(ctx.red_stock().await, Some(2));
}

#[tokio::test]
async fn test_draft_promotion_checks_stock() {
    let ctx = TestContext::new().await;
    let quote = ctx.service.propose(red_mugs(2)).await.unwrap();
    let draft = ctx
        .service
        .create_draft(&quote.signed.confirmation_token, &quote.signed.proposal)
        .await
        .unwrap();

    let other = ctx.service.propose(red_mugs(1)).await.unwrap();
    ctx.service
        .place(&other.signed.confirmation_token, &other.signed.proposal)
        .await
        .unwrap();

    let err = ctx
        .service
        .update_status(draft.id, OrderStatus::Pending)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "insufficient_stock");
    let unchanged = ctx.service.order(draft.id).await.unwrap();
    assert_eq!(unchanged.status, OrderStatus::Draft);
    assert_eq!(ctx.red_stock().await, Some(1));
}
