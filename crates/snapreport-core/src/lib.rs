pub mod catalog;
pub mod digest;
pub mod envelope;
pub mod error;
pub mod ids;
pub mod model;
pub mod render;

pub use catalog::*;
pub use digest::*;
pub use envelope::*;
pub use error::*;
pub use ids::*;
pub use model::*;
pub use render::*;
