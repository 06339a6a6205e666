//! Engine: reducers and hashing, plus the CLI front end (arguments, run handler, output helpers).

pub mod arg_parser;
pub mod bench;
pub mod cli;
pub mod hashing;
pub mod reducer;
pub mod tools;
pub mod tree_view;

// Re-export commonly used items
pub use arg_parser::Cli;
pub use bench::{Timings, run_repeated};
pub use cli::handle_run;
pub use hashing::hash_file;
pub use reducer::{ByteSize, ContentDigest, FileCount, Reducer, merge};
pub use tools::format_size;
pub use tree_view::render_tree;
