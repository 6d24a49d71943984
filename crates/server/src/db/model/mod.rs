mod cache_entry;
pub use cache_entry::*;

mod diagnostic;
pub use diagnostic::*;
