pub mod like;
pub mod song;
pub mod user;
