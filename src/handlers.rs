pub mod admin;
pub mod bbs;
pub mod health;
pub mod site;
pub mod user;
