//! End to end tests for the CIL toolchain: policies are compiled from source
//! and the resolved database is inspected.

#[cfg(test)]
mod utils;

#[cfg(test)]
mod resolver;
