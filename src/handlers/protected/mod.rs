// Routes behind the JWT middleware (/api/*)
pub mod collection;
pub mod record;
pub mod utils;

pub use collection::collection;
pub use record::record;
