pub mod output;
pub mod progress;
pub mod renderer;
pub mod usage_cmd;
