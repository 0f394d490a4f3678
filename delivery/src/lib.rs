pub mod api;
pub mod executable_utils;
pub mod identity;
