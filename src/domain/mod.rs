pub mod instrument;
pub mod order;
pub mod signal;

pub use instrument::*;
pub use order::*;
pub use signal::*;
