pub mod frame;
pub mod synth;
pub mod types;
