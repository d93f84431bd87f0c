#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

//! A multi-hop packet transit simulator.
//!
//! Every connected visualization client gets its own session: a set of routes whose packets
//! are walked hop by hop, each hop streamed to the client as a `packet` message, plus a small
//! control protocol to start, stop and list routes at runtime.

pub mod cli;
pub mod config;

pub use hopsim_engine::*;
pub use hopsim_transport::*;
pub use hopsim_wire as wire;
