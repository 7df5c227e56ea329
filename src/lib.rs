pub mod annotate;
pub mod assembler;
pub mod catalog;
pub mod chunking;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod detector;
pub mod document;
pub mod engine;
pub mod knowledge;
pub mod normalize;
pub mod pipeline;
pub mod provider;
pub mod report;
pub mod rules;
pub mod session;
pub mod util;
