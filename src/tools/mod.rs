pub mod configure;
pub mod editor;
