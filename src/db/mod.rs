pub mod pool;
pub mod users;

pub use pool::{create_lazy_pool, create_pool};
