//! Test utilities and fixtures for buildstash
//!
//! This crate provides shared test helpers that can be used by the
//! integration tests of both the core library and the CLI.

pub mod fixtures;
pub mod server;

pub use server::FakeRestServer;
