//! Common utilities for data loading and performance measurement.
//!
//! This module provides helper functions used by the test harness and the
//! experimental binaries. It is organized into two submodules:
//!
//! - **`data_loader`**: Parses the ASCII triplet format (Matrix-Market
//!   style) into the crate's CSC or CSR storage.
//!
//! - **`perf`**: Platform-specific utilities for performance analysis,
//!   currently a probe for the peak resident set size on Linux, which the
//!   memory experiments rely on.

pub mod data_loader;
pub mod perf;
