pub mod auth;
pub mod login_limiter;
pub mod request_id;
