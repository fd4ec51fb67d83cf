//! Storefront client library: identity resolution, the cart context and the
//! checkout flow. This is the consumer side of the HTTP API; rendering and
//! navigation live elsewhere.

pub mod cart;
pub mod checkout;
pub mod identity;

pub use cart::CartContext;
pub use checkout::{place_order, ShippingForm};
pub use identity::{FileGuestIdStore, GuestIdStore, Identity, MemoryGuestIdStore, SessionProvider};

use serde_json::Value;
use thiserror::Error;

/// User-facing failure from the storefront client. Transport and server
/// failures collapse into one generic message; `code` is populated only
/// when the server answered with a structured `{error, code}` body.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ClientError {
  pub message: String,
  pub code: Option<String>,
}

impl ClientError {
  pub fn message(message: impl Into<String>) -> Self {
    ClientError {
      message: message.into(),
      code: None,
    }
  }
}

pub(crate) async fn error_from_response(response: reqwest::Response, fallback: &str) -> ClientError {
  match response.json::<Value>().await {
    Ok(body) => {
      let message = body
        .get("error")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| fallback.to_string());
      let code = body.get("code").and_then(Value::as_str).map(str::to_string);
      ClientError { message, code }
    }
    Err(_) => ClientError::message(fallback),
  }
}
