pub mod archive;
pub mod dump;

pub use archive::package_and_replace;
pub use dump::{DUMP_TOOL, DumpRunner, Dumper};
