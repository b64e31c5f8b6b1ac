pub mod analysis;
pub mod ctx;
pub mod error;
pub mod executor;
pub mod scan;
pub mod state;
pub mod validate;

pub use error::{Error, Result};
pub use executor::Executor;
