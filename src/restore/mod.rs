pub mod load;

pub use load::{RESTORE_TOOL, RestoreRunner, Restorer};
