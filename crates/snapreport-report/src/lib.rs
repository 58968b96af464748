pub mod assembler;
pub mod workarea;

pub use assembler::*;
pub use workarea::*;
