//! spcs: SPC sample synthesizer
//!
//! Builds 5×25 X̄-R chart data for an inspection item from its tolerance
//! callout: control limits derived from a target Cpk, a randomized search
//! for measurements that hit that Cpk and pass the eight run rules, and
//! quantization to the measuring instrument's resolution.

pub mod cli;
pub mod core;
pub mod entities;
pub mod parse;
pub mod yaml;
