mod processor;
mod stripe;

pub use processor::*;
pub use stripe::*;
