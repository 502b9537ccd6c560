//! Snapshot data model: fingerprint records, the line format, the keyed
//! container with archive I/O, set algebra and the duplicate report.

pub mod algebra;
pub mod duplicates;
pub mod format;
pub mod record;
pub mod store;

#[cfg(test)]
mod test_properties;
