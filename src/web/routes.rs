use actix_web::web;

use crate::web::handlers::{cart_handlers, category_handlers, order_handlers, order_item_handlers, product_handlers};

async fn health_check_handler() -> actix_web::HttpResponse {
  actix_web::HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

// Record addressing follows the original HTTP surface: ids travel in query
// parameters (?id=, ?user_id=, ?order_id=), not path segments.
pub fn configure_app_routes(cfg: &mut web::ServiceConfig) {
  cfg.route("/health", web::get().to(health_check_handler));

  cfg.service(
    web::scope("/api")
      .service(
        web::resource("/categories")
          .route(web::get().to(category_handlers::get_categories_handler))
          .route(web::post().to(category_handlers::create_category_handler))
          .route(web::put().to(category_handlers::update_category_handler))
          .route(web::delete().to(category_handlers::delete_category_handler)),
      )
      .service(
        web::resource("/products")
          .route(web::get().to(product_handlers::get_products_handler))
          .route(web::post().to(product_handlers::create_product_handler))
          .route(web::put().to(product_handlers::update_product_handler))
          .route(web::delete().to(product_handlers::delete_product_handler)),
      )
      .service(
        web::resource("/cart")
          .route(web::get().to(cart_handlers::get_cart_handler))
          .route(web::post().to(cart_handlers::add_to_cart_handler))
          .route(web::put().to(cart_handlers::update_cart_item_handler))
          .route(web::delete().to(cart_handlers::delete_cart_items_handler)),
      )
      .service(
        web::resource("/orders")
          .route(web::get().to(order_handlers::get_orders_handler))
          .route(web::post().to(order_handlers::create_order_handler))
          .route(web::put().to(order_handlers::update_order_handler)),
      )
      .service(web::resource("/order-items").route(web::get().to(order_item_handlers::get_order_items_handler))),
  );
}
