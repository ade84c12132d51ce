pub mod directories;
pub mod logging;
pub mod progress;
pub mod shutdown;
