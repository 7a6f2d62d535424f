pub mod links;
pub mod phrase;
pub mod text;
