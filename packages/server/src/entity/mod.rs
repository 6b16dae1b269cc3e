pub mod download_log;
pub mod license;
pub mod perusal_request;
pub mod script;
pub mod user;
