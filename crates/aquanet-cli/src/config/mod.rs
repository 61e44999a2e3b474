mod builder;
mod defaults;
mod file;

pub use builder::build_analysis_config;
pub use file::FileConfig;
