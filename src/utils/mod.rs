pub mod config;
pub mod fd_limit;
pub mod logger;
pub mod treesum_toml;

pub use config::*;
pub use fd_limit::{FDS_PER_WORKER, cap_threads_by_fd_limit, max_open_fds, max_workers_by_fd_limit};
pub use logger::setup_logging;
pub use treesum_toml::{
    apply_file_to_opts, load_treesum_toml, parse_treesum_toml, secs_to_duration,
};
