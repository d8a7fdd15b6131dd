pub mod commands;
pub mod shells;
pub mod stdio;
pub mod store;
pub mod util;
