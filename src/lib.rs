//! MySQL database backup and restore tool.
//!
//! Connects to a MySQL server, enumerates its databases, and runs one of two
//! operations against a chosen database: export it to a compressed `.zip`
//! archive via `mysqldump`, or replay a SQL script into it via the `mysql`
//! client. The [`job::Orchestrator`] sequences connection validation, user
//! confirmation, external tool execution, archive packaging and status
//! reporting.

pub mod backup;
pub mod config;
pub mod connection;
pub mod errors;
pub mod job;
pub mod joblog;
pub mod restore;
