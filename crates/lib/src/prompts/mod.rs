//! # Prompt Template Modules
//!
//! This module organizes all prompt templates used throughout the `docextract` library.
//! It is divided into sub-modules based on the agent that uses them.

pub mod extraction;
pub mod factuality;
pub mod search;
