//! depbot - Dependency update bot library
//!
//! This library provides the building blocks of one update run:
//! - Update decisions with unlock-level escalation and peer-conflict deferral
//! - Manifest and lock-file regeneration for npm, yarn, pnpm and rush
//! - Pull request creation and in-place updates on Azure DevOps
//! - A staged on-disk cache of fetched files and parsed dependencies
//! - A run controller with exclusions, a pull request budget and cancellation

pub mod cache;
pub mod cli;
pub mod config;
pub mod controller;
pub mod decision;
pub mod domain;
pub mod ecosystem;
pub mod error;
pub mod http;
pub mod output;
pub mod progress;
pub mod provider;
pub mod pull_request;
pub mod regenerate;
pub mod version;
