pub mod song;
pub mod user;
pub mod value;
