mod balance;
mod expense;
mod money;
mod settlement;

pub use balance::*;
pub use expense::*;
pub use money::*;
pub use settlement::*;
