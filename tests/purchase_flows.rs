mod support;

use std::sync::Arc;

use payments_core::domain::payment::PaymentStatus;
use payments_core::domain::purchase::Purchase;
use payments_core::error::PaymentError;
use payments_core::gateways::autosuccess::AutosuccessAdapter;
use support::{registry_with, test_vault, visa_form, TestGateway};

#[tokio::test]
async fn auto_capture_on_a_fresh_purchase_captures_the_full_total() {
    let vault = test_vault(false, 3600);
    let registry = registry_with(vec![Arc::new(AutosuccessAdapter { vault })]);
    let mut purchase = Purchase::new(1000, "GBP");

    let affected = purchase
        .auto_capture(&registry, "AUTOSUCCESS", &visa_form())
        .await
        .unwrap();

    assert_eq!(affected.len(), 1);
    assert_eq!(purchase.payments.len(), 1);
    assert_eq!(purchase.payments[0].status, PaymentStatus::Captured);
    assert_eq!(purchase.captured_amount(), 1000);
    assert_eq!(purchase.authorized_amount(), 0);
}

#[tokio::test]
async fn auto_capture_after_total_lowered_captures_shortfall_and_releases_the_rest() {
    let registry = registry_with(vec![Arc::new(TestGateway::approving("TEST"))]);
    let mut purchase = Purchase::new(1500, "GBP");
    purchase
        .authorize(&registry, "TEST", &visa_form(), None)
        .await
        .unwrap();
    assert_eq!(purchase.authorized_amount(), 1500);

    // order was edited down after authorization
    purchase.total_minor = 1000;
    purchase
        .auto_capture(&registry, "TEST", &visa_form())
        .await
        .unwrap();

    assert_eq!(purchase.captured_amount(), 1000);
    assert_eq!(purchase.authorized_amount(), 0);
}

#[tokio::test]
async fn auto_capture_releases_authorizations_left_over_after_the_shortfall() {
    let registry = registry_with(vec![Arc::new(TestGateway::approving("TEST"))]);
    let mut purchase = Purchase::new(1500, "GBP");
    for _ in 0..3 {
        purchase
            .authorize(&registry, "TEST", &visa_form(), Some(500))
            .await
            .unwrap();
    }

    purchase.total_minor = 400;
    purchase
        .auto_capture(&registry, "TEST", &visa_form())
        .await
        .unwrap();

    assert_eq!(purchase.captured_amount(), 400);
    assert_eq!(purchase.authorized_amount(), 0);
    let cancelled = purchase
        .payments
        .iter()
        .filter(|p| p.status == PaymentStatus::Cancelled)
        .count();
    assert_eq!(cancelled, 2);
}

#[tokio::test]
async fn auto_capture_refunds_the_excess_when_over_captured() {
    let registry = registry_with(vec![Arc::new(TestGateway::approving("TEST"))]);
    let mut purchase = Purchase::new(1000, "GBP");
    purchase
        .capture(&registry, "TEST", &visa_form(), None)
        .await
        .unwrap();
    purchase
        .authorize(&registry, "TEST", &visa_form(), Some(300))
        .await
        .unwrap();
    assert_eq!(purchase.captured_amount(), 1000);

    purchase.total_minor = 600;
    purchase
        .auto_capture(&registry, "TEST", &visa_form())
        .await
        .unwrap();

    assert_eq!(purchase.captured_amount(), 600);
    assert_eq!(purchase.authorized_amount(), 0);
}

#[tokio::test]
async fn capture_consumes_authorizations_before_direct_capture() {
    let registry = registry_with(vec![Arc::new(TestGateway::approving("TEST"))]);
    let mut purchase = Purchase::new(2000, "GBP");
    purchase
        .authorize(&registry, "TEST", &visa_form(), Some(500))
        .await
        .unwrap();

    purchase
        .capture(&registry, "TEST", &visa_form(), None)
        .await
        .unwrap();

    assert_eq!(purchase.captured_amount(), 2000);
    assert_eq!(purchase.authorized_amount(), 0);
    assert_eq!(purchase.payments.len(), 2);
    assert!(purchase
        .payments
        .iter()
        .all(|p| p.status == PaymentStatus::Captured));
}

#[tokio::test]
async fn capture_rejects_amounts_above_the_open_total() {
    let registry = registry_with(vec![Arc::new(TestGateway::approving("TEST"))]);
    let mut purchase = Purchase::new(1000, "GBP");

    let err = purchase
        .capture(&registry, "TEST", &visa_form(), Some(1500))
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::InvalidAmount(_)));
    assert!(purchase.payments.is_empty());
}

#[tokio::test]
async fn over_authorization_is_tolerated() {
    let registry = registry_with(vec![Arc::new(TestGateway::approving("TEST"))]);
    let mut purchase = Purchase::new(1000, "GBP");

    purchase
        .authorize(&registry, "TEST", &visa_form(), Some(2000))
        .await
        .unwrap();
    assert_eq!(purchase.authorized_amount(), 2000);
}

#[tokio::test]
async fn capture_authorized_walks_payments_in_creation_order() {
    let registry = registry_with(vec![Arc::new(TestGateway::approving("TEST"))]);
    let mut purchase = Purchase::new(1500, "GBP");
    let first = purchase
        .authorize(&registry, "TEST", &visa_form(), Some(800))
        .await
        .unwrap();
    let second = purchase
        .authorize(&registry, "TEST", &visa_form(), Some(700))
        .await
        .unwrap();

    let affected = purchase
        .capture_authorized(&registry, Some(900))
        .await
        .unwrap();

    assert_eq!(affected, vec![first, second]);
    assert_eq!(purchase.payment(first).unwrap().amount_minor, 800);
    assert_eq!(purchase.payment(second).unwrap().amount_minor, 100);
    assert_eq!(purchase.captured_amount(), 900);
}

#[tokio::test]
async fn capture_authorized_rejects_amounts_above_authorized() {
    let registry = registry_with(vec![Arc::new(TestGateway::approving("TEST"))]);
    let mut purchase = Purchase::new(1000, "GBP");
    purchase
        .authorize(&registry, "TEST", &visa_form(), Some(500))
        .await
        .unwrap();

    let err = purchase
        .capture_authorized(&registry, Some(900))
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::InvalidAmount(_)));
}

#[tokio::test]
async fn capture_authorized_with_nothing_authorized_is_empty() {
    let registry = registry_with(vec![Arc::new(TestGateway::approving("TEST"))]);
    let mut purchase = Purchase::new(1000, "GBP");

    let affected = purchase.capture_authorized(&registry, None).await.unwrap();
    assert!(affected.is_empty());
}

#[tokio::test]
async fn refund_walks_captures_and_reports_affected_payments() {
    let registry = registry_with(vec![Arc::new(TestGateway::approving("TEST"))]);
    let mut purchase = Purchase::new(1000, "GBP");
    let first = purchase
        .capture(&registry, "TEST", &visa_form(), Some(600))
        .await
        .unwrap();
    let second = purchase
        .capture(&registry, "TEST", &visa_form(), Some(400))
        .await
        .unwrap();

    let affected = purchase.refund(&registry, Some(700)).await.unwrap();

    assert_eq!(affected, vec![first, second]);
    assert_eq!(purchase.payment(first).unwrap().status, PaymentStatus::Refunded);
    assert_eq!(purchase.payment(second).unwrap().amount_minor, 300);
    assert_eq!(purchase.captured_amount(), 300);
}

#[tokio::test]
async fn refund_rejects_amounts_above_captured() {
    let registry = registry_with(vec![Arc::new(TestGateway::approving("TEST"))]);
    let mut purchase = Purchase::new(1000, "GBP");
    purchase
        .capture(&registry, "TEST", &visa_form(), Some(500))
        .await
        .unwrap();

    let err = purchase.refund(&registry, Some(800)).await.unwrap_err();
    assert!(matches!(err, PaymentError::InvalidAmount(_)));
    assert_eq!(purchase.captured_amount(), 500);
}

#[tokio::test]
async fn cancel_sweeps_all_live_payments_and_reports_failures() {
    let registry = registry_with(vec![
        Arc::new(TestGateway::approving("TEST")),
        Arc::new(TestGateway {
            key: "STUCK",
            behavior: "RELEASE_FAILS",
        }),
    ]);
    let mut purchase = Purchase::new(2000, "GBP");
    let captured = purchase
        .capture(&registry, "TEST", &visa_form(), Some(500))
        .await
        .unwrap();
    let good = purchase
        .authorize(&registry, "TEST", &visa_form(), Some(600))
        .await
        .unwrap();
    let stuck = purchase
        .authorize(&registry, "STUCK", &visa_form(), Some(400))
        .await
        .unwrap();

    let failed = purchase.cancel(&registry).await;

    assert_eq!(failed, vec![stuck]);
    assert_eq!(purchase.payment(good).unwrap().status, PaymentStatus::Cancelled);
    assert_eq!(purchase.payment(stuck).unwrap().status, PaymentStatus::Authorized);
    assert_eq!(purchase.payment(captured).unwrap().status, PaymentStatus::Refunded);
}

#[tokio::test]
async fn mid_sweep_gateway_failure_keeps_earlier_captures() {
    let registry = registry_with(vec![
        Arc::new(TestGateway::approving("TEST")),
        Arc::new(TestGateway {
            key: "FLAKY",
            behavior: "CAPTURE_FAILS",
        }),
    ]);
    let mut purchase = Purchase::new(1000, "GBP");
    let first = purchase
        .authorize(&registry, "TEST", &visa_form(), Some(600))
        .await
        .unwrap();
    purchase
        .authorize(&registry, "FLAKY", &visa_form(), Some(400))
        .await
        .unwrap();

    let err = purchase.capture_authorized(&registry, None).await.unwrap_err();
    assert!(matches!(err, PaymentError::Gateway(_)));

    // money already moved on the first payment stays moved
    assert_eq!(purchase.payment(first).unwrap().status, PaymentStatus::Captured);
    assert_eq!(purchase.captured_amount(), 600);
}

#[tokio::test]
async fn auto_authorize_covers_only_the_shortfall() {
    let registry = registry_with(vec![Arc::new(TestGateway::approving("TEST"))]);
    let mut purchase = Purchase::new(1000, "GBP");
    purchase
        .capture(&registry, "TEST", &visa_form(), Some(400))
        .await
        .unwrap();

    let id = purchase
        .auto_authorize(&registry, "TEST", &visa_form())
        .await
        .unwrap()
        .expect("shortfall should produce a payment");
    assert_eq!(purchase.payment(id).unwrap().amount_minor, 600);

    let again = purchase
        .auto_authorize(&registry, "TEST", &visa_form())
        .await
        .unwrap();
    assert!(again.is_none());
}

#[tokio::test]
async fn pushed_status_updates_apply_through_the_store() {
    use payments_core::gateways::worldpay;
    use payments_core::gateways::AdapterResult;
    use payments_core::store::PurchaseStore;

    let registry = registry_with(vec![Arc::new(TestGateway::approving("TEST"))]);
    let mut purchase = Purchase::new(1000, "GBP");
    let payment_id = purchase
        .authorize(&registry, "TEST", &visa_form(), None)
        .await
        .unwrap();
    let purchase_id = purchase.id;

    let store = PurchaseStore::new();
    store.insert(purchase).await;

    // the merchant-channel callback pushes {payment_id, status_code, amount}
    let applied = store
        .apply_to_payment(
            payment_id,
            AdapterResult {
                status: worldpay::map_status_code("CAPTURED"),
                amount_minor: Some(1000),
                ..Default::default()
            },
        )
        .await;
    assert!(applied);

    let purchase = store.get(purchase_id).await.unwrap();
    assert_eq!(purchase.payment(payment_id).unwrap().status, PaymentStatus::Captured);
    assert_eq!(purchase.captured_amount(), 1000);

    let unknown = store
        .apply_to_payment(uuid::Uuid::new_v4(), AdapterResult::default())
        .await;
    assert!(!unknown);
}

#[tokio::test]
async fn unknown_gateway_key_is_a_configuration_error() {
    let registry = registry_with(vec![Arc::new(TestGateway::approving("TEST"))]);
    let mut purchase = Purchase::new(1000, "GBP");

    let err = purchase
        .authorize(&registry, "NOSUCH", &visa_form(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::Configuration(_)));
}

#[tokio::test]
async fn gateway_keys_resolve_case_insensitively() {
    let registry = registry_with(vec![Arc::new(TestGateway::approving("TEST"))]);
    let mut purchase = Purchase::new(1000, "GBP");

    purchase
        .authorize(&registry, "test", &visa_form(), None)
        .await
        .unwrap();
    assert_eq!(purchase.authorized_amount(), 1000);
}
