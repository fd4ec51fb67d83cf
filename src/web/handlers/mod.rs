pub mod cart_handlers;
pub mod category_handlers;
pub mod order_handlers;
pub mod order_item_handlers;
pub mod product_handlers;
