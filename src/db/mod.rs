pub mod audit;
pub mod menus;
pub mod papers;
pub mod permissions;
pub mod profiles;
pub mod roles;
pub mod screens;
pub mod users;
