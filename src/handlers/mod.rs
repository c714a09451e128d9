pub mod dyes;
pub mod locales;
pub mod session;
