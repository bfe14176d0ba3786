pub mod cfg;
pub mod common;
pub mod count;
pub mod facts;
pub mod stack;
