pub mod dfa;
pub mod hrv;
pub mod mean_max;

pub use dfa::*;
pub use hrv::*;
pub use mean_max::*;
