//! Integration tests for the checkout path: receipt production, local
//! stock settlement, and atomicity when the submission fails.

use rust_decimal::Decimal;
use till_core::{Money, PaymentMethod, ProductId};
use till_integration_tests::FakePosApi;
use till_terminal::{
    ApiError, CartEngine, CatalogGateway, CheckoutCoordinator, CheckoutError,
};

fn money(s: &str) -> Money {
    s.parse().expect("valid money literal")
}

#[tokio::test]
async fn checkout_produces_receipt_and_decrements_cached_stock() {
    let api = FakePosApi::spawn().await;
    api.seed_product("p-100", "Espresso Beans 1kg", "10.00", 10);

    let client = api.client_with_session().await;
    let catalog = CatalogGateway::new(client.clone());
    let coordinator = CheckoutCoordinator::new(client, catalog.clone());

    let product = catalog
        .fetch_product(&ProductId::new("p-100"))
        .await
        .expect("fetch");

    let mut cart = CartEngine::new();
    cart.add_item(&product, 3).expect("add");
    cart.set_discount_percent(Decimal::from(10)).expect("rate");
    cart.set_tax_percent(Decimal::from(18)).expect("rate");

    let receipt = coordinator
        .checkout(&cart, PaymentMethod::Card, "Walk-in")
        .await
        .expect("checkout");
    cart.clear();

    assert_eq!(receipt.subtotal, money("30.00"));
    assert_eq!(receipt.discount_amount, money("3.00"));
    assert_eq!(receipt.tax_amount, money("4.86"));
    assert_eq!(receipt.grand_total, money("31.86"));
    assert_eq!(receipt.customer, "Walk-in");
    assert_eq!(receipt.lines.len(), 1);
    assert_eq!(api.sale_count(), 1);

    // The committed quantity is settled against the cached stock view.
    let cached = catalog
        .fetch_product(&ProductId::new("p-100"))
        .await
        .expect("cached fetch");
    assert_eq!(cached.available_stock, 7);
}

#[tokio::test]
async fn failed_submission_leaves_cart_and_stock_intact_for_retry() {
    let api = FakePosApi::spawn().await;
    api.seed_product("p-7", "Oat Milk 1L", "4.25", 8);

    let client = api.client_with_session().await;
    let catalog = CatalogGateway::new(client.clone());
    let coordinator = CheckoutCoordinator::new(client, catalog.clone());

    let product = catalog
        .fetch_product(&ProductId::new("p-7"))
        .await
        .expect("fetch");

    let mut cart = CartEngine::new();
    cart.add_item(&product, 2).expect("add");
    cart.set_tax_percent(Decimal::from(5)).expect("rate");

    let lines_before = cart.lines().to_vec();
    let totals_before = cart.totals();

    api.fail_sales_with(500);
    let err = coordinator
        .checkout(&cart, PaymentMethod::Cash, "Walk-in")
        .await
        .expect_err("submission must fail");
    assert!(matches!(err, CheckoutError::Failed(_)), "got {err:?}");

    // Nothing may have been applied: same lines, same totals, same stock.
    assert_eq!(cart.lines(), lines_before.as_slice());
    assert_eq!(cart.totals(), totals_before);
    let cached = catalog
        .fetch_product(&ProductId::new("p-7"))
        .await
        .expect("cached fetch");
    assert_eq!(cached.available_stock, 8);
    assert_eq!(api.sale_count(), 0);

    // Retry is a caller decision; the same cart submits cleanly.
    api.fail_sales_with(0);
    coordinator
        .checkout(&cart, PaymentMethod::Cash, "Walk-in")
        .await
        .expect("manual retry succeeds");
    assert_eq!(api.sale_count(), 1);
}

#[tokio::test]
async fn auth_failure_during_checkout_propagates_and_preserves_cart() {
    let api = FakePosApi::spawn().await;
    api.seed_product("p-1", "Widget", "2.00", 5);

    let client = api.client_with_session().await;
    let catalog = CatalogGateway::new(client.clone());
    let coordinator = CheckoutCoordinator::new(client, catalog.clone());

    let product = catalog
        .fetch_product(&ProductId::new("p-1"))
        .await
        .expect("fetch");
    let mut cart = CartEngine::new();
    cart.add_item(&product, 1).expect("add");

    // Session dies between building the cart and submitting.
    api.reject_all_bearer(true);
    api.reject_refresh(true);

    let err = coordinator
        .checkout(&cart, PaymentMethod::Card, "Walk-in")
        .await
        .expect_err("auth failure");

    assert!(
        matches!(err, CheckoutError::Auth(ApiError::SessionExpired)),
        "got {err:?}"
    );
    // The sale did not commit: cart intact, no stock movement.
    assert_eq!(cart.lines().len(), 1);
    assert_eq!(api.sale_count(), 0);
}

#[tokio::test]
async fn checkout_preconditions_are_enforced() {
    let api = FakePosApi::spawn().await;
    api.seed_product("p-1", "Widget", "2.00", 5);

    let client = api.client_with_session().await;
    let catalog = CatalogGateway::new(client.clone());
    let coordinator = CheckoutCoordinator::new(client, catalog.clone());

    let empty = CartEngine::new();
    let err = coordinator
        .checkout(&empty, PaymentMethod::Cash, "Walk-in")
        .await
        .expect_err("empty cart");
    assert!(matches!(err, CheckoutError::EmptyCart));

    let product = catalog
        .fetch_product(&ProductId::new("p-1"))
        .await
        .expect("fetch");
    let mut cart = CartEngine::new();
    cart.add_item(&product, 1).expect("add");

    let err = coordinator
        .checkout(&cart, PaymentMethod::Cash, "   ")
        .await
        .expect_err("blank customer");
    assert!(matches!(err, CheckoutError::MissingCustomer));

    assert_eq!(api.sale_count(), 0);
}

#[tokio::test]
async fn validation_rejection_surfaces_as_failed_not_auth() {
    let api = FakePosApi::spawn().await;
    api.seed_product("p-1", "Widget", "2.00", 5);

    let client = api.client_with_session().await;
    let catalog = CatalogGateway::new(client.clone());
    let coordinator = CheckoutCoordinator::new(client, catalog.clone());

    let product = catalog
        .fetch_product(&ProductId::new("p-1"))
        .await
        .expect("fetch");
    let mut cart = CartEngine::new();
    cart.add_item(&product, 1).expect("add");

    api.fail_sales_with(422);
    let err = coordinator
        .checkout(&cart, PaymentMethod::Cash, "Walk-in")
        .await
        .expect_err("validation rejection");

    match err {
        CheckoutError::Failed(reason) => {
            assert!(reason.contains("422"), "reason should carry the status: {reason}");
        }
        other => panic!("expected Failed, got {other:?}"),
    }
}
