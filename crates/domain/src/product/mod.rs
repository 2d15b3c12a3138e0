//! Product aggregate and the entities it owns.

mod aggregate;
mod batch;
mod value_objects;

pub use aggregate::Product;
pub use batch::Batch;
pub use value_objects::OrderLine;
