pub mod http_errors;
pub mod responses;
