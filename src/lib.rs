//! A tabled Finite-State Entropy (tANS) codec for byte-valued symbols.
//!
//! Implementation de final-state-rs, tenter d'implementer FSE en Rust.
//! Author: Adrien Zinger, avec l'inspiration du travail de Jarek Duda,
//!         Yann Collet, Charles Bloom et bien d'autres.

pub mod bitstream;
pub mod error;
pub mod histogram;
pub mod spread;
pub mod tans;
