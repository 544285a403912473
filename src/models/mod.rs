pub mod entry;
pub mod mood;
pub mod profile;
pub mod todo;
pub mod user;
