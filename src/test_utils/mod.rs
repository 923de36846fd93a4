//! Shared test utilities
//!
//! Fixtures for building throwaway recipe trees and source archives, plus a
//! scripted stand-in for the external build tool.

#[cfg(any(test, debug_assertions))]
pub mod mocks;

#[cfg(any(test, debug_assertions))]
pub mod fixtures;
