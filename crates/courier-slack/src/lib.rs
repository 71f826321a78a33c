pub mod client;
pub mod events;
pub mod parse;
pub mod signature;
