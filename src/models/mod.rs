pub mod condition;
pub mod enums;
pub mod filter;
pub mod procedure;

pub use condition::*;
pub use filter::*;
pub use procedure::*;
