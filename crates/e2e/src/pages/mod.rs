//! Page objects for the OrangeHRM screens the suite drives

pub mod admin;
pub mod login;

pub use admin::{AdminPage, NewUser, RoleChoice};
pub use login::LoginPage;
