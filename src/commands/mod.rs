pub mod check_config;
pub mod daemon;
pub mod init;
pub mod remote;
pub mod utils;

pub use check_config::check_config;
pub use daemon::start;
pub use init::init;
pub use remote::{reset, status};
pub use utils::init_logging;
