// Parser module: line splitting, field tokenizing and header utilities.

pub mod fields;
pub mod header;
pub mod lines;
