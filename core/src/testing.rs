pub mod compare;
pub mod result;
pub mod runner;
pub mod suite;
pub mod testcase;

pub use compare::*;
pub use result::*;
pub use runner::*;
pub use suite::*;
pub use testcase::*;
