pub mod memory;
pub mod postgres;
pub mod repo;

pub use memory::MemoryRepository;
pub use postgres::{create_pool, run_migrations, PgRepository};
pub use repo::*;
