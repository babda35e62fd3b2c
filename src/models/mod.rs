pub mod catalog;
pub mod ids;
pub mod price;
pub mod wishlist;

pub use catalog::*;
pub use ids::*;
pub use price::*;
pub use wishlist::*;
