//! Product lookup command.

use till_core::ProductId;
use till_terminal::CatalogGateway;

use super::build_client;

/// Print a product snapshot.
#[allow(clippy::print_stdout)]
pub async fn show(id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let client = build_client().await?;
    let catalog = CatalogGateway::new(client);

    let product = catalog.fetch_product(&ProductId::new(id)).await?;

    println!("{:<12} {}", "id:", product.id);
    println!("{:<12} {}", "name:", product.name);
    println!("{:<12} {}", "price:", product.unit_price);
    println!("{:<12} {}", "stock:", product.available_stock);
    if let Some(category) = &product.category {
        println!("{:<12} {category}", "category:");
    }

    Ok(())
}
