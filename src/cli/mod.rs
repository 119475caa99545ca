mod app;
mod args;

pub use app::*;
pub use args::*;
