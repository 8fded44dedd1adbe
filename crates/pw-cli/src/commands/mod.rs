pub mod characters;
pub mod chat;
pub mod context;
