pub mod image;
pub mod sanitize;
