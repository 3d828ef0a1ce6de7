//! The in-progress sale.
//!
//! `CartEngine` is pure and synchronous: the terminal runs cart mutations
//! to completion between await points, so the engine needs no locking.
//! Each line snapshots the product's price and stock ceiling at add time;
//! mutations that would break an invariant are rejected whole, never
//! partially applied.

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use till_core::{Money, ProductId};

use crate::catalog::ProductSnapshot;

/// Rejected cart mutations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CartError {
    /// The product has no sellable stock at all.
    #[error("product is out of stock")]
    OutOfStock,

    /// The mutation would push a line past its stock ceiling.
    /// `requested` is the quantity the line would have held; `available`
    /// is the ceiling from the product snapshot.
    #[error("insufficient stock: requested {requested}, only {available} available")]
    InsufficientStock {
        requested: u32,
        available: u32,
    },

    /// Discount or tax rate outside its valid range.
    #[error("invalid rate: {0}")]
    InvalidRate(String),
}

/// One product entry in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartLine {
    /// The product this line sells.
    pub product_id: ProductId,
    /// Display name captured at add time.
    pub name: String,
    /// Price per unit captured at add time; later catalog fetches do not
    /// reprice lines already in the cart.
    pub unit_price_at_add: Money,
    /// Units on this line. Always >= 1 and <= the stock ceiling.
    pub quantity: u32,
    /// Stock ceiling from the product snapshot at add time.
    available_stock: u32,
}

impl CartLine {
    /// Price times quantity, exact.
    #[must_use]
    pub fn line_total(&self) -> Money {
        self.unit_price_at_add.times(self.quantity)
    }

    /// The stock ceiling this line is held to.
    #[must_use]
    pub const fn stock_ceiling(&self) -> u32 {
        self.available_stock
    }
}

/// Computed cart totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Totals {
    /// Sum of line totals.
    pub subtotal: Money,
    /// Discount taken off the subtotal.
    pub discount_amount: Money,
    /// Tax on the discounted subtotal.
    pub tax_amount: Money,
    /// Final payable amount.
    pub grand_total: Money,
}

/// The in-memory sale being rung up.
///
/// Owned by a single checkout context; not shared across concurrent sales.
#[derive(Debug, Default, Clone)]
pub struct CartEngine {
    /// Lines in insertion order (order matters only for display).
    lines: Vec<CartLine>,
    discount_percent: Decimal,
    tax_percent: Decimal,
    customer_label: String,
}

impl CartEngine {
    /// Create an empty cart with zero discount and tax.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines in insertion order.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Current discount rate in percent.
    #[must_use]
    pub const fn discount_percent(&self) -> Decimal {
        self.discount_percent
    }

    /// Current tax rate in percent.
    #[must_use]
    pub const fn tax_percent(&self) -> Decimal {
        self.tax_percent
    }

    /// Free-text label for who the sale is for.
    #[must_use]
    pub fn customer_label(&self) -> &str {
        &self.customer_label
    }

    /// Set the customer label.
    pub fn set_customer_label(&mut self, label: impl Into<String>) {
        self.customer_label = label.into();
    }

    /// Add `requested_qty` units of a product (a requested quantity below 1
    /// is treated as 1).
    ///
    /// A new line is clamped to the product's stock ceiling; increasing an
    /// existing line past its ceiling is rejected outright with no partial
    /// increase, so the operator sees the warning instead of a silently
    /// smaller quantity.
    ///
    /// # Errors
    ///
    /// `OutOfStock` if the product has zero stock; `InsufficientStock` if
    /// an existing line cannot grow by the full requested amount.
    pub fn add_item(
        &mut self,
        product: &ProductSnapshot,
        requested_qty: u32,
    ) -> Result<(), CartError> {
        let requested = requested_qty.max(1);

        if let Some(line) = self.lines.iter_mut().find(|l| l.product_id == product.id) {
            let new_quantity = line.quantity.saturating_add(requested);
            if new_quantity > line.available_stock {
                return Err(CartError::InsufficientStock {
                    requested: new_quantity,
                    available: line.available_stock,
                });
            }
            line.quantity = new_quantity;
            return Ok(());
        }

        if product.available_stock == 0 {
            return Err(CartError::OutOfStock);
        }

        self.lines.push(CartLine {
            product_id: product.id.clone(),
            name: product.name.clone(),
            unit_price_at_add: product.unit_price,
            quantity: requested.min(product.available_stock),
            available_stock: product.available_stock,
        });
        Ok(())
    }

    /// Replace a line's quantity. Below 1 removes the line; above the stock
    /// ceiling is rejected. Unknown products are a no-op.
    ///
    /// # Errors
    ///
    /// `InsufficientStock` if `quantity` exceeds the line's stock ceiling.
    pub fn set_quantity(&mut self, product_id: &ProductId, quantity: u32) -> Result<(), CartError> {
        if quantity < 1 {
            self.remove_item(product_id);
            return Ok(());
        }

        if let Some(line) = self.lines.iter_mut().find(|l| &l.product_id == product_id) {
            if quantity > line.available_stock {
                return Err(CartError::InsufficientStock {
                    requested: quantity,
                    available: line.available_stock,
                });
            }
            line.quantity = quantity;
        }
        Ok(())
    }

    /// Remove a line if present; no-op otherwise.
    pub fn remove_item(&mut self, product_id: &ProductId) {
        self.lines.retain(|l| &l.product_id != product_id);
    }

    /// Set the discount rate in percent.
    ///
    /// # Errors
    ///
    /// `InvalidRate` if outside [0, 100].
    pub fn set_discount_percent(&mut self, percent: Decimal) -> Result<(), CartError> {
        if percent < Decimal::ZERO || percent > Decimal::ONE_HUNDRED {
            return Err(CartError::InvalidRate(format!(
                "discount must be between 0 and 100, got {percent}"
            )));
        }
        self.discount_percent = percent;
        Ok(())
    }

    /// Set the tax rate in percent.
    ///
    /// # Errors
    ///
    /// `InvalidRate` if negative.
    pub fn set_tax_percent(&mut self, percent: Decimal) -> Result<(), CartError> {
        if percent < Decimal::ZERO {
            return Err(CartError::InvalidRate(format!(
                "tax must not be negative, got {percent}"
            )));
        }
        self.tax_percent = percent;
        Ok(())
    }

    /// Compute the cart totals.
    ///
    /// Pure function of the current lines and rates: calling it twice
    /// without a mutation in between yields identical values.
    #[must_use]
    pub fn totals(&self) -> Totals {
        let subtotal = self
            .lines
            .iter()
            .fold(Money::ZERO, |acc, line| acc + line.line_total());
        let discount_amount = subtotal.percent_of(self.discount_percent);
        let tax_amount = (subtotal - discount_amount).percent_of(self.tax_percent);
        let grand_total = subtotal - discount_amount + tax_amount;

        Totals {
            subtotal,
            discount_amount,
            tax_amount,
            grand_total,
        }
    }

    /// Empty the cart and reset discount, tax, and customer label.
    ///
    /// Catalog snapshots fetched elsewhere are untouched.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.discount_percent = Decimal::ZERO;
        self.tax_percent = Decimal::ZERO;
        self.customer_label.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(id: &str, price: &str, stock: u32) -> ProductSnapshot {
        ProductSnapshot {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            unit_price: price.parse().expect("valid price"),
            available_stock: stock,
            category: None,
        }
    }

    fn money(s: &str) -> Money {
        s.parse().expect("valid money literal")
    }

    #[test]
    fn add_item_defaults_to_one_unit() {
        let mut cart = CartEngine::new();
        cart.add_item(&product("p-1", "10.00", 5), 1).expect("add");
        assert_eq!(cart.lines()[0].quantity, 1);
    }

    #[test]
    fn add_item_clamps_first_insert_to_stock() {
        let mut cart = CartEngine::new();
        cart.add_item(&product("p-1", "10.00", 2), 5).expect("add");
        assert_eq!(cart.lines()[0].quantity, 2);
    }

    #[test]
    fn add_item_rejects_zero_stock() {
        let mut cart = CartEngine::new();
        let err = cart.add_item(&product("p-1", "10.00", 0), 1).unwrap_err();
        assert_eq!(err, CartError::OutOfStock);
        assert!(cart.is_empty());
    }

    #[test]
    fn add_item_rejects_increase_past_ceiling_without_partial_apply() {
        let mut cart = CartEngine::new();
        let p = product("p-1", "10.00", 2);
        cart.add_item(&p, 1).expect("first add");

        let err = cart.add_item(&p, 3).unwrap_err();
        assert_eq!(
            err,
            CartError::InsufficientStock {
                requested: 4,
                available: 2
            }
        );
        // Strict policy: no partial increase.
        assert_eq!(cart.lines()[0].quantity, 1);
    }

    #[test]
    fn add_item_increases_within_ceiling() {
        let mut cart = CartEngine::new();
        let p = product("p-1", "10.00", 5);
        cart.add_item(&p, 2).expect("add");
        cart.add_item(&p, 3).expect("increase");
        assert_eq!(cart.lines()[0].quantity, 5);
        assert_eq!(cart.lines().len(), 1);
    }

    #[test]
    fn quantity_never_exceeds_stock_across_mutations() {
        let mut cart = CartEngine::new();
        let p = product("p-1", "3.25", 4);
        cart.add_item(&p, 10).expect("clamped add");
        let _ = cart.add_item(&p, 1);
        let _ = cart.set_quantity(&p.id, 9);
        let _ = cart.set_quantity(&p.id, 3);
        let _ = cart.add_item(&p, 2);

        for line in cart.lines() {
            assert!(line.quantity <= line.stock_ceiling());
        }
    }

    #[test]
    fn set_quantity_below_one_removes_line() {
        let mut cart = CartEngine::new();
        let p = product("p-1", "10.00", 5);
        cart.add_item(&p, 2).expect("add");
        cart.set_quantity(&p.id, 0).expect("remove via zero");
        assert!(cart.is_empty());
    }

    #[test]
    fn set_quantity_rejects_past_ceiling() {
        let mut cart = CartEngine::new();
        let p = product("p-1", "10.00", 5);
        cart.add_item(&p, 2).expect("add");

        let err = cart.set_quantity(&p.id, 6).unwrap_err();
        assert_eq!(
            err,
            CartError::InsufficientStock {
                requested: 6,
                available: 5
            }
        );
        assert_eq!(cart.lines()[0].quantity, 2);
    }

    #[test]
    fn set_quantity_on_unknown_product_is_noop() {
        let mut cart = CartEngine::new();
        cart.set_quantity(&ProductId::new("ghost"), 3).expect("noop");
        assert!(cart.is_empty());
    }

    #[test]
    fn remove_item_is_idempotent() {
        let mut cart = CartEngine::new();
        let p = product("p-1", "10.00", 5);
        cart.add_item(&p, 1).expect("add");
        cart.remove_item(&p.id);
        cart.remove_item(&p.id);
        assert!(cart.is_empty());
    }

    #[test]
    fn rates_outside_range_are_rejected() {
        let mut cart = CartEngine::new();
        assert!(matches!(
            cart.set_discount_percent(Decimal::from(101)),
            Err(CartError::InvalidRate(_))
        ));
        assert!(matches!(
            cart.set_discount_percent(Decimal::from(-1)),
            Err(CartError::InvalidRate(_))
        ));
        assert!(matches!(
            cart.set_tax_percent(Decimal::from(-1)),
            Err(CartError::InvalidRate(_))
        ));
        // Rejection leaves the previous rates intact.
        assert_eq!(cart.discount_percent(), Decimal::ZERO);
        assert_eq!(cart.tax_percent(), Decimal::ZERO);
    }

    #[test]
    fn totals_match_receipt_scenario() {
        // One line {price: 10.00, qty: 3}, discount 10%, tax 18%.
        let mut cart = CartEngine::new();
        cart.add_item(&product("p-1", "10.00", 10), 3).expect("add");
        cart.set_discount_percent(Decimal::from(10)).expect("rate");
        cart.set_tax_percent(Decimal::from(18)).expect("rate");

        let totals = cart.totals();
        assert_eq!(totals.subtotal, money("30.00"));
        assert_eq!(totals.discount_amount, money("3.00"));
        assert_eq!(totals.tax_amount, money("4.86"));
        assert_eq!(totals.grand_total, money("31.86"));
    }

    #[test]
    fn grand_total_identity_holds() {
        let mut cart = CartEngine::new();
        cart.add_item(&product("p-1", "7.77", 100), 13).expect("add");
        cart.add_item(&product("p-2", "0.05", 100), 99).expect("add");
        cart.set_discount_percent(Decimal::new(125, 1)).expect("rate");
        cart.set_tax_percent(Decimal::new(725, 2)).expect("rate");

        let t = cart.totals();
        assert_eq!(t.grand_total, t.subtotal - t.discount_amount + t.tax_amount);
    }

    #[test]
    fn totals_are_idempotent() {
        let mut cart = CartEngine::new();
        cart.add_item(&product("p-1", "19.99", 10), 2).expect("add");
        cart.set_tax_percent(Decimal::from(8)).expect("rate");

        assert_eq!(cart.totals(), cart.totals());
    }

    #[test]
    fn empty_cart_totals_are_zero() {
        let totals = CartEngine::new().totals();
        assert_eq!(totals.subtotal, Money::ZERO);
        assert_eq!(totals.grand_total, Money::ZERO);
    }

    #[test]
    fn clear_resets_lines_and_rates() {
        let mut cart = CartEngine::new();
        cart.add_item(&product("p-1", "10.00", 5), 2).expect("add");
        cart.set_discount_percent(Decimal::from(5)).expect("rate");
        cart.set_tax_percent(Decimal::from(18)).expect("rate");
        cart.set_customer_label("Walk-in");

        cart.clear();

        assert!(cart.is_empty());
        assert_eq!(cart.discount_percent(), Decimal::ZERO);
        assert_eq!(cart.tax_percent(), Decimal::ZERO);
        assert!(cart.customer_label().is_empty());
    }
}
