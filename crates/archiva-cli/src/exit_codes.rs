//! Standard exit codes for CLI operations
//!
//! These exit codes follow Unix conventions and sysexits.h where applicable.

#![allow(dead_code)]

/// Success - operation completed without errors
pub const SUCCESS: i32 = 0;

/// General error - unspecified failure
pub const ERROR: i32 = 1;

/// Configuration error - unreadable or invalid configuration file
pub const CONFIG_ERROR: i32 = 2;

/// Not found - no remote repository delivered the requested resource
pub const NOT_FOUND: i32 = 3;

/// Index error - scanning, merging or downloading an index failed
pub const INDEX_ERROR: i32 = 4;

/// IO error - file not found, permission denied, etc.
pub const IO_ERROR: i32 = 5;

/// Proxy error - a remote repository refused or failed the request
pub const PROXY_ERROR: i32 = 6;

/// Usage error - invalid arguments or options (following sysexits.h convention)
pub const USAGE_ERROR: i32 = 64;
