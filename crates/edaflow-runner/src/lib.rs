//! edaflow runner library
//!
//! Drives batch EDA tools through their stages:
//! - Process supervision with an artifact predicate and a deadline
//! - Stage pipelines in fused or incremental (checkpointed) mode
//! - Checkpoint bookkeeping for resuming incremental runs
//! - Yosys and OpenROAD invocations without checkpoints
//! - Synthesis + place-and-route flows with PPA extraction

pub mod checkpoint;
pub mod flow;
pub mod openflow;
pub mod pipeline;
pub mod supervisor;
