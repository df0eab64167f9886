//! Data models shared between the server and clients

pub mod cart;
pub mod product;

pub use cart::{Cart, CartItem, CartItemDetail, CartOwner, CartSnapshot, merge_items};
pub use product::{Product, ProductCreate};
