pub mod auth;
pub mod entries;
pub mod health;
pub mod moods;
pub mod profile;
pub mod todos;
