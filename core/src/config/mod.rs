mod load;
mod types;

pub use load::{get_encore_data_dir, load_default};
pub use types::{AppConfig, LoggingConfig, RepeatConfig};
