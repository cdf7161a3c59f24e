pub mod long_only;
pub mod preflight;

pub use long_only::{enforce_long_only, parse_requested_direction};
pub use preflight::{PreflightCheck, PreflightReport};
