pub mod cli;
pub mod db;
pub mod routes;
pub mod upstream;

mod errors;
pub use errors::*;

mod state;
pub use state::*;
