// Entity Models
// Lookup data loaded from the record store once per run:
// - Category: canonical categories referenced by migrated transactions
// - Identity: the registered user the run writes on behalf of

pub mod category;
pub mod identity;

pub use category::{Category, CategoryTable, CategoryType};
pub use identity::{select_identity, Identity};
