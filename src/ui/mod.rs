//! Terminal output helpers for the `modelstore` binary

pub mod icons;
pub mod output;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{banner, error, info, section, status, success, summary_row, warn};
pub use table::{TableBuilder, columns_table, stats_table};
pub use theme::{theme, Theme};
