pub mod regression;
pub mod rolling;

pub use regression::*;
pub use rolling::*;
