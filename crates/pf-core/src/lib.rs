//! pf-core: shared foundation for the propagation crates.
//!
//! Contains:
//! - numeric (Real + tolerances + float helpers)
//! - time (AbsoluteDate with split whole/fractional seconds)
//! - error (shared error types)

pub mod error;
pub mod numeric;
pub mod time;

pub use error::{CoreError, CoreResult};
pub use numeric::*;
pub use time::AbsoluteDate;
