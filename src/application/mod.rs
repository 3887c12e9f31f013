// Application layer - operation contracts and orchestration over the
// repository and the payment processor.

pub mod error;
pub mod service;

pub use error::*;
pub use service::*;
