use reqwest::header::AUTHORIZATION;
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::client::cart::CartContext;
use crate::client::{error_from_response, ClientError};
use crate::models::{CartItemWithProduct, OrderWithItems};

/// Orders at or above this subtotal ship free; everything else pays the
/// flat fee.
pub const FREE_SHIPPING_THRESHOLD: f64 = 2000.0;
pub const SHIPPING_FEE: f64 = 50.0;

#[derive(Debug, Clone, Default)]
pub struct ShippingForm {
  pub full_name: String,
  pub email: String,
  pub phone: String,
  pub address: String,
  pub city: String,
  pub state: String,
  pub pincode: String,
}

impl ShippingForm {
  pub fn is_complete(&self) -> bool {
    ![
      &self.full_name,
      &self.email,
      &self.phone,
      &self.address,
      &self.city,
      &self.state,
      &self.pincode,
    ]
    .iter()
    .any(|field| field.trim().is_empty())
  }

  pub fn formatted_address(&self) -> String {
    format!("{}, {}, {} - {}", self.address, self.city, self.state, self.pincode)
  }
}

/// Price a line was added at: the product's sale price when set, its list
/// price otherwise, zero when the product has been deleted.
pub fn line_unit_price(line: &CartItemWithProduct) -> f64 {
  line.product.as_ref().map(|p| p.effective_price()).unwrap_or(0.0)
}

pub fn subtotal(lines: &[CartItemWithProduct]) -> f64 {
  lines
    .iter()
    .map(|line| line_unit_price(line) * f64::from(line.item.quantity))
    .sum()
}

pub fn shipping_fee(subtotal: f64) -> f64 {
  if subtotal >= FREE_SHIPPING_THRESHOLD {
    0.0
  } else {
    SHIPPING_FEE
  }
}

/// Submits the order for the current cart.
///
/// The order and its line items are persisted by the server in one
/// transaction; clearing the cart afterwards is best-effort and never fails
/// the placed order. Any earlier failure aborts the remaining steps, and
/// work the server already committed is not rolled back here.
#[instrument(name = "checkout::place_order", skip(cart, form))]
pub async fn place_order(cart: &mut CartContext, form: &ShippingForm) -> Result<OrderWithItems, ClientError> {
  if !form.is_complete() {
    return Err(ClientError::message("Please fill in all fields"));
  }
  if cart.items().is_empty() {
    return Err(ClientError::message("Your cart is empty"));
  }
  if !cart.identity().is_authenticated() {
    return Err(ClientError::message("Please log in to checkout"));
  }

  let cart_subtotal = subtotal(cart.items());
  let total = cart_subtotal + shipping_fee(cart_subtotal);

  let items: Vec<serde_json::Value> = cart
    .items()
    .iter()
    .map(|line| {
      json!({
        "productId": line.item.product_id,
        "quantity": line.item.quantity,
        "price": line_unit_price(line),
      })
    })
    .collect();

  let response = cart
    .http()
    .post(format!("{}/api/orders", cart.base_url()))
    .header(AUTHORIZATION, cart.authorization())
    .json(&json!({
      "userId": cart.identity().id(),
      "totalAmount": total,
      "status": "pending",
      "shippingAddress": form.formatted_address(),
      "items": items,
    }))
    .send()
    .await
    .map_err(|_| ClientError::message("Failed to place order. Please try again."))?;

  if !response.status().is_success() {
    return Err(error_from_response(response, "Failed to place order. Please try again.").await);
  }

  let order: OrderWithItems = response
    .json()
    .await
    .map_err(|_| ClientError::message("Failed to place order. Please try again."))?;

  info!(order_id = order.order.id, total, "Order placed.");

  if let Err(e) = cart.clear_cart().await {
    warn!(error = %e, "Failed to clear cart after checkout; order is unaffected.");
  }

  Ok(order)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::{CartItem, Product};
  use chrono::Utc;

  fn product(price: f64, sale_price: Option<f64>) -> Product {
    Product {
      id: 7,
      name: "Blocks".to_string(),
      description: "wooden blocks".to_string(),
      price,
      sale_price,
      images: None,
      category_id: None,
      age_range: None,
      stock_quantity: 5,
      vendor: "Kuviyal".to_string(),
      is_combo: false,
      save_amount: None,
      created_at: Utc::now(),
    }
  }

  fn line(quantity: i32, product: Option<Product>) -> CartItemWithProduct {
    CartItemWithProduct {
      item: CartItem {
        id: 1,
        user_id: "u1".to_string(),
        product_id: 7,
        quantity,
        created_at: Utc::now(),
      },
      product,
    }
  }

  #[test]
  fn sale_price_wins_over_list_price() {
    assert_eq!(line_unit_price(&line(1, Some(product(299.0, Some(249.0))))), 249.0);
    assert_eq!(line_unit_price(&line(1, Some(product(299.0, None)))), 299.0);
    // A zero sale price falls back to the list price
    assert_eq!(line_unit_price(&line(1, Some(product(299.0, Some(0.0))))), 299.0);
  }

  #[test]
  fn deleted_products_contribute_nothing() {
    assert_eq!(line_unit_price(&line(3, None)), 0.0);
    assert_eq!(subtotal(&[line(3, None)]), 0.0);
  }

  #[test]
  fn subtotal_multiplies_by_quantity() {
    let lines = vec![line(2, Some(product(100.0, None))), line(1, Some(product(50.0, Some(40.0))))];
    assert_eq!(subtotal(&lines), 240.0);
  }

  #[test]
  fn shipping_is_free_at_the_threshold() {
    assert_eq!(shipping_fee(1999.99), SHIPPING_FEE);
    assert_eq!(shipping_fee(2000.0), 0.0);
    assert_eq!(shipping_fee(2500.0), 0.0);
  }

  #[test]
  fn form_completeness_requires_every_field() {
    let mut form = ShippingForm {
      full_name: "Asha".to_string(),
      email: "asha@example.com".to_string(),
      phone: "9999999999".to_string(),
      address: "12 Beach Road".to_string(),
      city: "Chennai".to_string(),
      state: "TN".to_string(),
      pincode: "600001".to_string(),
    };
    assert!(form.is_complete());

    form.phone = "  ".to_string();
    assert!(!form.is_complete());
  }

  #[test]
  fn address_is_formatted_as_one_line() {
    let form = ShippingForm {
      address: "12 Beach Road".to_string(),
      city: "Chennai".to_string(),
      state: "TN".to_string(),
      pincode: "600001".to_string(),
      ..Default::default()
    };
    assert_eq!(form.formatted_address(), "12 Beach Road, Chennai, TN - 600001");
  }
}
