pub mod basic;
pub mod constants;
pub mod frame;
pub mod packet;
pub mod synth;
