//! Sale entry command.
//!
//! Builds a cart from `product-id:quantity` arguments, applies the rates,
//! and runs checkout. Any rejected line aborts the sale before submission
//! so the operator can correct the entry.

use std::str::FromStr;

use rust_decimal::Decimal;
use thiserror::Error;
use till_core::{PaymentMethod, ProductId};
use till_terminal::{CartEngine, CatalogGateway, CheckoutCoordinator, Receipt};

use super::build_client;

/// Errors parsing sale-entry arguments.
#[derive(Debug, Error)]
pub enum SellError {
    /// Line item argument is not `product-id:quantity`.
    #[error("invalid line item {0:?}: expected product-id:quantity")]
    InvalidItem(String),

    /// Rate argument is not a decimal number.
    #[error("invalid rate {0:?}")]
    InvalidRate(String),

    /// Payment method argument is unknown.
    #[error("{0}")]
    InvalidPayment(String),
}

fn parse_item(raw: &str) -> Result<(ProductId, u32), SellError> {
    let (id, qty) = raw
        .rsplit_once(':')
        .ok_or_else(|| SellError::InvalidItem(raw.to_owned()))?;
    let quantity: u32 = qty
        .parse()
        .map_err(|_| SellError::InvalidItem(raw.to_owned()))?;
    if id.is_empty() || quantity == 0 {
        return Err(SellError::InvalidItem(raw.to_owned()));
    }
    Ok((ProductId::new(id), quantity))
}

fn parse_rate(raw: &str) -> Result<Decimal, SellError> {
    Decimal::from_str(raw).map_err(|_| SellError::InvalidRate(raw.to_owned()))
}

/// Ring up and submit a sale, printing the receipt.
pub async fn run(
    customer: &str,
    payment: &str,
    discount: &str,
    tax: &str,
    items: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    let payment_method =
        PaymentMethod::from_str(payment).map_err(SellError::InvalidPayment)?;
    let discount = parse_rate(discount)?;
    let tax = parse_rate(tax)?;

    let client = build_client().await?;
    let catalog = CatalogGateway::new(client.clone());
    let coordinator = CheckoutCoordinator::new(client, catalog.clone());

    let mut cart = CartEngine::new();
    cart.set_discount_percent(discount)?;
    cart.set_tax_percent(tax)?;

    for raw in items {
        let (product_id, quantity) = parse_item(raw)?;
        let product = catalog.fetch_product(&product_id).await?;
        cart.add_item(&product, quantity)?;
    }

    let receipt = coordinator
        .checkout(&cart, payment_method, customer)
        .await?;
    cart.clear();

    print_receipt(&receipt);
    Ok(())
}

#[allow(clippy::print_stdout)]
fn print_receipt(receipt: &Receipt) {
    println!("sale {} ({})", receipt.sale_id, receipt.created_at);
    println!("customer: {}  payment: {}", receipt.customer, receipt.payment_method);
    println!();
    for line in &receipt.lines {
        println!(
            "  {:<24} {:>3} x {:>8}  = {:>9}",
            line.name, line.quantity, line.unit_price, line.line_total
        );
    }
    println!();
    println!("  {:<12} {:>9}", "subtotal", receipt.subtotal);
    if !receipt.discount_amount.is_zero() {
        println!("  {:<12} {:>9}", "discount", receipt.discount_amount);
    }
    if !receipt.tax_amount.is_zero() {
        println!("  {:<12} {:>9}", "tax", receipt.tax_amount);
    }
    println!("  {:<12} {:>9}", "total", receipt.grand_total);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_item_accepts_id_and_quantity() {
        let (id, qty) = parse_item("p-100:3").expect("valid item");
        assert_eq!(id, ProductId::new("p-100"));
        assert_eq!(qty, 3);
    }

    #[test]
    fn test_parse_item_rejects_malformed_input() {
        assert!(parse_item("p-100").is_err());
        assert!(parse_item("p-100:zero").is_err());
        assert!(parse_item(":3").is_err());
        assert!(parse_item("p-100:0").is_err());
    }

    #[test]
    fn test_parse_rate() {
        assert_eq!(parse_rate("12.5").expect("valid"), Decimal::new(125, 1));
        assert!(parse_rate("ten").is_err());
    }
}
