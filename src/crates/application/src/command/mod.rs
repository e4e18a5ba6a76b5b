pub mod like;
pub mod shared;
pub mod song;
pub mod user;
