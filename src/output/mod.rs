pub mod export;
pub mod formatter;

pub use export::{to_json, write_json};
pub use formatter::{
    format_age, format_analysis, format_history, format_priority_detail, format_ranked_table,
    format_ranked_tsv, format_rejected, format_skipped, format_tiers, should_use_colors,
};
