pub mod backend;
pub mod engine;
pub mod i18n;
