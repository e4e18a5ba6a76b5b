pub mod cors;
pub mod policy;
pub mod security;

pub use cors::cors;
pub use policy::enforce_policy;
pub use security::{Auth, SecurityContextResolver};
