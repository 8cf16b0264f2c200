pub mod item;
pub mod snapshot;

pub use item::{categories_overlap, Item, ItemId, MAX_RATING};
pub use snapshot::CatalogSnapshot;
