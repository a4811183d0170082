pub mod brapi;
pub mod error;
pub mod jobs;
pub mod mapping;
pub mod merge;
pub mod orchestrator;
pub mod parser;
pub mod preview;
pub mod registry;
pub mod resolver;
pub mod types;
pub mod validation;
pub mod workflow;
pub mod writer;
