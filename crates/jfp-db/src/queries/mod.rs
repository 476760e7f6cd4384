pub mod backends;
pub mod mappings;
pub mod sessions;
pub mod users;
