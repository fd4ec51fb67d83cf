//! Kuviyal Store: storefront backend (actix-web + sqlx over Postgres) and
//! the client library driving it (cart context, checkout flow).

pub mod client;
pub mod config;
pub mod db;
pub mod errors;
pub mod models;
pub mod state;
pub mod web;
