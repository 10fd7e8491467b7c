pub mod live;
pub mod output;
pub mod table;

pub use live::{LiveReport, ReportRow, Summary};
pub use output::{select, write_config};
pub use table::{render, sort_results};
