#[macro_use]
extern crate log;

pub mod chunk_writer;
pub mod cli;
pub mod contract;
pub mod env;
pub mod error;
pub mod filter;
pub mod ipc;
pub mod logger;
pub mod manifest;
pub mod merger;
pub mod model;
pub mod orchestrator;
pub mod paged_reader;
pub mod pagination;
pub mod parser;
pub mod readers;
pub mod settings;
pub mod stager;
pub mod time;
pub mod warmup;

pub use miette::Result;
