pub mod columns;
pub mod domain;
pub mod filter;
pub mod format;
pub mod grid;
pub mod record;
pub mod source;
pub mod style;
