pub mod builder;

pub use builder::{QueryKind, SearchQuery};
