//! Cross-module tests and test doubles


mod pipeline;
mod streams;
