//! Seams to the services a run depends on but does not own: parameter
//! lookup, snapshot storage, the query engine, and downstream delivery.

pub mod env;
pub mod fs;
pub mod memory;
pub mod process;
pub mod traits;

pub use env::*;
pub use fs::*;
pub use memory::*;
pub use process::*;
pub use traits::*;
