//! Request / response bodies of the HTTP API.

pub mod admin;
pub mod v1;
