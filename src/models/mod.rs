pub mod common;
pub mod errors;
pub mod events;
pub mod holders;
pub mod inventory;
