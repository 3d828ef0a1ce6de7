//! Committing a sale.
//!
//! The coordinator snapshots the cart before the network round trip, so an
//! operator editing the live cart while the submission is in flight cannot
//! change what gets committed. Stock is only decremented locally after the
//! server accepts the sale; any failure leaves the cart and the cached
//! stock untouched.
//!
//! Checkout is never retried automatically. The sale endpoint has no
//! idempotency key, so re-submitting after a lost response could commit
//! the sale twice; retry is an explicit operator action. The
//! client-generated receipt id is sent as `reference` so a future server
//! can dedupe without a contract change.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use till_core::{Money, PaymentMethod, ProductId, ReceiptId, SaleId};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::cart::{CartEngine, Totals};
use crate::catalog::CatalogGateway;
use crate::client::ApiClient;
use crate::error::ApiError;

/// Why a checkout did not produce a receipt.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Nothing to sell.
    #[error("cart is empty")]
    EmptyCart,

    /// The sale needs a customer label.
    #[error("customer name is required")]
    MissingCustomer,

    /// The session is unusable; the caller must force a logout. The cart
    /// is intact - the sale did not commit.
    #[error(transparent)]
    Auth(ApiError),

    /// Submission failed for a non-auth reason (network, server error,
    /// validation). The cart is intact so the operator can retry.
    #[error("checkout failed: {0}")]
    Failed(String),
}

/// One line as it appears on a receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceiptLine {
    /// Product sold.
    pub product_id: ProductId,
    /// Product name at sale time.
    pub name: String,
    /// Units sold.
    pub quantity: u32,
    /// Price per unit.
    pub unit_price: Money,
    /// Price times quantity.
    pub line_total: Money,
}

/// The immutable record of a committed sale.
///
/// Produced once per successful checkout and never mutated; the next
/// checkout produces a new one.
#[derive(Debug, Clone, Serialize)]
pub struct Receipt {
    /// Client-generated receipt id (also sent to the server as the sale
    /// reference).
    pub id: ReceiptId,
    /// Server-assigned sale id.
    pub sale_id: SaleId,
    /// When the sale was committed (server time when provided).
    pub created_at: DateTime<Utc>,
    /// Who the sale was for.
    pub customer: String,
    /// How it was paid.
    pub payment_method: PaymentMethod,
    /// Line snapshots.
    pub lines: Vec<ReceiptLine>,
    /// Sum of line totals.
    pub subtotal: Money,
    /// Discount taken off the subtotal.
    pub discount_amount: Money,
    /// Tax on the discounted subtotal.
    pub tax_amount: Money,
    /// Final payable amount.
    pub grand_total: Money,
}

#[derive(Serialize)]
struct SaleLineRequest {
    product_id: ProductId,
    name: String,
    quantity: u32,
    unit_price: Money,
    line_total: Money,
}

#[derive(Serialize)]
struct SaleRequest {
    reference: ReceiptId,
    customer: String,
    payment_method: PaymentMethod,
    discount_percent: Decimal,
    tax_percent: Decimal,
    lines: Vec<SaleLineRequest>,
    subtotal: Money,
    discount_amount: Money,
    tax_amount: Money,
    grand_total: Money,
}

#[derive(Deserialize)]
struct SaleResponse {
    id: SaleId,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

/// Turns a cart into a committed sale and a receipt.
#[derive(Clone)]
pub struct CheckoutCoordinator {
    api: ApiClient,
    catalog: CatalogGateway,
}

impl CheckoutCoordinator {
    /// Create a coordinator submitting through `api` and settling stock
    /// against `catalog`.
    #[must_use]
    pub const fn new(api: ApiClient, catalog: CatalogGateway) -> Self {
        Self { api, catalog }
    }

    /// Submit the cart as a sale.
    ///
    /// On success the catalog's cached stock is decremented per line and a
    /// [`Receipt`] is returned; the caller is expected to clear the cart.
    /// On any failure the cart and cached stock are untouched.
    ///
    /// # Errors
    ///
    /// `EmptyCart`/`MissingCustomer` for precondition failures; `Auth` for
    /// `Unauthenticated`/`SessionExpired` (do not clear the cart - the sale
    /// did not commit); `Failed` for everything else, with the cart left
    /// intact for a manual retry.
    #[instrument(skip(self, cart), fields(lines = cart.lines().len(), customer = %customer_label))]
    pub async fn checkout(
        &self,
        cart: &CartEngine,
        payment_method: PaymentMethod,
        customer_label: &str,
    ) -> Result<Receipt, CheckoutError> {
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        let customer = customer_label.trim();
        if customer.is_empty() {
            return Err(CheckoutError::MissingCustomer);
        }

        // Snapshot before the await point; the live cart stays mutable
        // while the submission is in flight.
        let lines: Vec<ReceiptLine> = cart
            .lines()
            .iter()
            .map(|line| ReceiptLine {
                product_id: line.product_id.clone(),
                name: line.name.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price_at_add,
                line_total: line.line_total(),
            })
            .collect();
        let totals: Totals = cart.totals();
        let reference = ReceiptId::new(Uuid::new_v4().to_string());

        let request = SaleRequest {
            reference: reference.clone(),
            customer: customer.to_owned(),
            payment_method,
            discount_percent: cart.discount_percent(),
            tax_percent: cart.tax_percent(),
            lines: lines
                .iter()
                .map(|line| SaleLineRequest {
                    product_id: line.product_id.clone(),
                    name: line.name.clone(),
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                    line_total: line.line_total,
                })
                .collect(),
            subtotal: totals.subtotal,
            discount_amount: totals.discount_amount,
            tax_amount: totals.tax_amount,
            grand_total: totals.grand_total,
        };

        let response: SaleResponse = match self.api.post_json("/sales", &request).await {
            Ok(response) => response,
            Err(e) if e.is_auth() => return Err(CheckoutError::Auth(e)),
            Err(e) => {
                warn!(error = %e, "sale submission failed, cart left intact");
                return Err(CheckoutError::Failed(e.to_string()));
            }
        };

        // The sale is committed; settle the local stock view.
        for line in &lines {
            self.catalog
                .decrement_stock(&line.product_id, line.quantity)
                .await;
        }

        Ok(Receipt {
            id: reference,
            sale_id: response.id,
            created_at: response.created_at.unwrap_or_else(Utc::now),
            customer: customer.to_owned(),
            payment_method,
            lines,
            subtotal: totals.subtotal,
            discount_amount: totals.discount_amount,
            tax_amount: totals.tax_amount,
            grand_total: totals.grand_total,
        })
    }
}
