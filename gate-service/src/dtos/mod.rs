pub mod access_request;
pub mod admin;
pub mod share;
