use std::sync::Arc;

use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::client::identity::{resolve_identity, GuestIdStore, Identity, SessionProvider};
use crate::client::{error_from_response, ClientError};
use crate::models::CartItemWithProduct;

/// Client-side cart state, reconciled against the server cart resource.
///
/// Explicit lifecycle: constructed on app start, torn down with
/// [`CartContext::sign_out`]. Every mutation is fire-and-refetch: the
/// server response is never merged into local state, the whole cart is
/// reloaded instead. No optimistic updates, no rollback, no retries.
pub struct CartContext {
  http: Client,
  base_url: String,
  session: Arc<dyn SessionProvider>,
  guest_ids: Arc<dyn GuestIdStore>,
  identity: Identity,
  items: Vec<CartItemWithProduct>,
  drawer_open: bool,
}

impl CartContext {
  pub fn new(base_url: impl Into<String>, session: Arc<dyn SessionProvider>, guest_ids: Arc<dyn GuestIdStore>) -> Self {
    let identity = resolve_identity(session.as_ref(), guest_ids.as_ref());
    CartContext {
      http: Client::new(),
      base_url: base_url.into(),
      session,
      guest_ids,
      identity,
      items: Vec::new(),
      drawer_open: false,
    }
  }

  /// Constructs the context and loads the server cart for the resolved
  /// identity. A failed initial load leaves an empty cart.
  pub async fn initialize(
    base_url: impl Into<String>,
    session: Arc<dyn SessionProvider>,
    guest_ids: Arc<dyn GuestIdStore>,
  ) -> Self {
    let mut context = CartContext::new(base_url, session, guest_ids);
    context.refresh().await;
    context
  }

  pub fn identity(&self) -> &Identity {
    &self.identity
  }

  pub fn items(&self) -> &[CartItemWithProduct] {
    &self.items
  }

  /// Header-badge count: sum of quantities across all rows.
  pub fn cart_count(&self) -> i32 {
    self.items.iter().map(|line| line.item.quantity).sum()
  }

  pub fn is_cart_open(&self) -> bool {
    self.drawer_open
  }

  pub fn open_cart(&mut self) {
    self.drawer_open = true;
  }

  pub fn close_cart(&mut self) {
    self.drawer_open = false;
  }

  /// Tears the context down: local rows and drawer state are dropped and
  /// the identity falls back to the persisted guest id.
  pub fn sign_out(&mut self) {
    self.items.clear();
    self.drawer_open = false;
    self.identity = resolve_identity(self.session.as_ref(), self.guest_ids.as_ref());
  }

  pub(crate) fn http(&self) -> &Client {
    &self.http
  }

  pub(crate) fn base_url(&self) -> &str {
    &self.base_url
  }

  pub(crate) fn authorization(&self) -> String {
    format!("Bearer {}", self.session.bearer_token().unwrap_or_default())
  }

  /// Reloads the full server cart, replacing local state wholesale. Load
  /// failures are logged and leave the current rows in place.
  #[instrument(name = "cart::refresh", skip(self), fields(user_id = %self.identity.id()))]
  pub async fn refresh(&mut self) {
    let request = self
      .http
      .get(format!("{}/api/cart", self.base_url))
      .query(&[("user_id", self.identity.id())])
      .header(AUTHORIZATION, self.authorization());

    match request.send().await {
      Ok(response) if response.status().is_success() => match response.json::<Vec<CartItemWithProduct>>().await {
        Ok(items) => self.items = items,
        Err(e) => warn!(error = %e, "Failed to decode cart response."),
      },
      Ok(response) => warn!(status = %response.status(), "Cart fetch answered with an error status."),
      Err(e) => warn!(error = %e, "Error fetching cart."),
    }
  }

  /// Adds a product to the cart and re-syncs. Requires an authenticated
  /// user; guests are turned away even though a guest id exists.
  #[instrument(name = "cart::add_to_cart", skip(self))]
  pub async fn add_to_cart(&mut self, product_id: i64, quantity: i32) -> Result<(), ClientError> {
    if !self.identity.is_authenticated() {
      return Err(ClientError::message("Please log in to add items to cart"));
    }

    let response = self
      .http
      .post(format!("{}/api/cart", self.base_url))
      .header(AUTHORIZATION, self.authorization())
      .json(&json!({
        "userId": self.identity.id(),
        "productId": product_id,
        "quantity": quantity,
      }))
      .send()
      .await
      .map_err(|_| ClientError::message("Failed to add to cart"))?;

    if !response.status().is_success() {
      return Err(error_from_response(response, "Failed to add to cart").await);
    }

    self.refresh().await;
    self.open_cart();
    info!(product_id, quantity, "Added to cart.");
    Ok(())
  }

  #[instrument(name = "cart::update_quantity", skip(self))]
  pub async fn update_quantity(&mut self, cart_item_id: i64, quantity: i32) -> Result<(), ClientError> {
    let response = self
      .http
      .put(format!("{}/api/cart", self.base_url))
      .query(&[("id", cart_item_id)])
      .header(AUTHORIZATION, self.authorization())
      .json(&json!({ "quantity": quantity }))
      .send()
      .await
      .map_err(|_| ClientError::message("Failed to update quantity"))?;

    if !response.status().is_success() {
      return Err(ClientError::message("Failed to update quantity"));
    }

    self.refresh().await;
    Ok(())
  }

  #[instrument(name = "cart::remove_from_cart", skip(self))]
  pub async fn remove_from_cart(&mut self, cart_item_id: i64) -> Result<(), ClientError> {
    let response = self
      .http
      .delete(format!("{}/api/cart", self.base_url))
      .query(&[("id", cart_item_id)])
      .header(AUTHORIZATION, self.authorization())
      .send()
      .await
      .map_err(|_| ClientError::message("Failed to remove item"))?;

    if !response.status().is_success() {
      return Err(ClientError::message("Failed to remove item"));
    }

    self.refresh().await;
    Ok(())
  }

  /// Empties the server cart for the active identity and drops local rows.
  #[instrument(name = "cart::clear_cart", skip(self), fields(user_id = %self.identity.id()))]
  pub async fn clear_cart(&mut self) -> Result<(), ClientError> {
    let response = self
      .http
      .delete(format!("{}/api/cart", self.base_url))
      .query(&[("user_id", self.identity.id())])
      .header(AUTHORIZATION, self.authorization())
      .send()
      .await
      .map_err(|_| ClientError::message("Failed to clear cart"))?;

    if !response.status().is_success() {
      return Err(ClientError::message("Failed to clear cart"));
    }

    self.items.clear();
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::client::identity::MemoryGuestIdStore;
  use crate::models::{CartItem, Product};
  use chrono::Utc;

  struct NoSession;

  impl SessionProvider for NoSession {
    fn user_id(&self) -> Option<String> {
      None
    }
    fn bearer_token(&self) -> Option<String> {
      None
    }
  }

  struct SignedIn;

  impl SessionProvider for SignedIn {
    fn user_id(&self) -> Option<String> {
      Some("u1".to_string())
    }
    fn bearer_token(&self) -> Option<String> {
      Some("token-123".to_string())
    }
  }

  fn line(quantity: i32) -> CartItemWithProduct {
    CartItemWithProduct {
      item: CartItem {
        id: 1,
        user_id: "u1".to_string(),
        product_id: 7,
        quantity,
        created_at: Utc::now(),
      },
      product: Some(Product {
        id: 7,
        name: "Blocks".to_string(),
        description: "wooden blocks".to_string(),
        price: 299.0,
        sale_price: None,
        images: None,
        category_id: None,
        age_range: None,
        stock_quantity: 5,
        vendor: "Kuviyal".to_string(),
        is_combo: false,
        save_amount: None,
        created_at: Utc::now(),
      }),
    }
  }

  fn guest_context() -> CartContext {
    CartContext::new(
      "http://localhost:8080",
      Arc::new(NoSession),
      Arc::new(MemoryGuestIdStore::default()),
    )
  }

  #[test]
  fn cart_count_sums_quantities() {
    let mut context = guest_context();
    assert_eq!(context.cart_count(), 0);
    context.items = vec![line(2), line(3)];
    assert_eq!(context.cart_count(), 5);
  }

  #[test]
  fn drawer_state_toggles() {
    let mut context = guest_context();
    assert!(!context.is_cart_open());
    context.open_cart();
    assert!(context.is_cart_open());
    context.close_cart();
    assert!(!context.is_cart_open());
  }

  #[test]
  fn sign_out_clears_state_and_falls_back_to_guest() {
    let store = Arc::new(MemoryGuestIdStore::default());
    let mut context = CartContext::new("http://localhost:8080", Arc::new(SignedIn), store);
    assert!(context.identity().is_authenticated());

    context.items = vec![line(1)];
    context.open_cart();
    context.sign_out();

    assert!(context.items().is_empty());
    assert!(!context.is_cart_open());
    // Identity re-resolves through the provider; the session here still
    // reports a user, so the context picks it up again.
    assert!(context.identity().is_authenticated());
  }

  #[tokio::test]
  async fn guests_cannot_add_to_cart() {
    let mut context = guest_context();
    // A guest id exists, and is still not enough to add to the cart.
    assert!(context.identity().id().starts_with("guest-"));

    let err = context.add_to_cart(7, 1).await.unwrap_err();
    assert_eq!(err.message, "Please log in to add items to cart");
    assert!(err.code.is_none());
    assert!(!context.is_cart_open());
  }

  #[test]
  fn authorization_header_carries_bearer_token() {
    let context = CartContext::new(
      "http://localhost:8080",
      Arc::new(SignedIn),
      Arc::new(MemoryGuestIdStore::default()),
    );
    assert_eq!(context.authorization(), "Bearer token-123");

    // Guests still send the header, with an empty token
    assert_eq!(guest_context().authorization(), "Bearer ");
  }
}
