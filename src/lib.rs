pub mod application;
pub mod cli;
pub mod domain;
pub mod payments;
pub mod storage;

pub use domain::*;
pub use storage::Repository;
