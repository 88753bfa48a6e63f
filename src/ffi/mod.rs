// In: src/ffi/mod.rs

//! Python bindings. Compiled only with the `python` feature.

pub mod python;
