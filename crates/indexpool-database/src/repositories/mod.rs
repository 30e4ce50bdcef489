//! Repository implementations for IndexPool entities.

pub mod item;

pub use item::ItemRepository;
