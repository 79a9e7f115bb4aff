pub mod destroy;
pub mod grant;
pub mod location;
pub mod status;
pub mod up;
pub mod user;
