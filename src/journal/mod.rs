//! Provenance journal: append-only event log and BLAKE3 digests.

pub mod eventlog;
pub mod hasher;
