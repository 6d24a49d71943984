mod assets;
pub use assets::*;

mod config;
pub use config::*;

mod control;
pub use control::*;

mod diagnostic;
pub use diagnostic::*;
