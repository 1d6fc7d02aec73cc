pub mod laps;
pub mod stage;

pub use laps::*;
pub use stage::*;
