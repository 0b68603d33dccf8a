//! Profile import core for flame.cat.
//!
//! Text profiler output is read through a [`lines::LineSource`], tokenized by
//! a format importer in [`parsers`], and fed as full-stack samples into one
//! [`builder::StackSampleBuilder`] per execution context. Each builder
//! produces a [`model::Profile`] holding an aggregated call tree.

pub mod builder;
pub mod lines;
pub mod model;
pub mod parsers;
