//! Data structures representing database entities and the composed shapes
//! the API returns (cart rows with their product attached, orders with
//! their items, order items with a product snapshot).

pub mod cart_item;
pub mod category;
pub mod order;
pub mod order_item;
pub mod product;

pub use cart_item::{CartItem, CartItemWithProduct};
pub use category::Category;
pub use order::{Order, OrderWithItems};
pub use order_item::{OrderItem, OrderItemWithProduct};
pub use product::Product;
