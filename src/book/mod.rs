pub mod pending;
pub mod traded;

pub use pending::PendingOrdersBook;
pub use traded::TradedOrdersBook;
