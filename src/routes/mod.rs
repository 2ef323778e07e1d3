pub mod assets;
pub mod auth;
pub mod blog;
pub mod cloud;
pub mod pages;
