//! `stockroom-masters` — master data: items, locations, departments.
//!
//! Reference data is immutable once in circulation; persistence of masters
//! is a collaborator concern.

pub mod department;
pub mod item;
pub mod location;

pub use department::Department;
pub use item::Item;
pub use location::Location;
