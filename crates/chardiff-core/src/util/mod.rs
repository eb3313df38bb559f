//! Pure helpers over dotted paths and JSON values.

pub mod compare;
pub mod extract;
pub mod path;
