pub mod configure;
pub mod tools;
