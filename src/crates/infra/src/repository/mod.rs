pub mod in_memory;
pub mod postgres;

pub use in_memory::like::InMemoryLikeRepository;
pub use in_memory::song::InMemorySongRepository;
pub use in_memory::user::InMemoryUserRepository;
pub use postgres::command::user::UserRepositoryImpl;
