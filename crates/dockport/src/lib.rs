//! # dockport
//!
//! Command-line front end for the Dockport port mapping resolver.

#![warn(missing_docs)]

pub mod cli;
pub mod config;
