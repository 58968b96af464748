pub mod acquirer;
pub mod config;
pub mod dispatcher;
pub mod executor;
pub mod pipeline;
pub mod util;

pub use acquirer::*;
pub use config::*;
pub use dispatcher::*;
pub use executor::*;
pub use pipeline::*;
pub use util::*;
