pub mod attendance;
pub mod clock;
pub mod closer;
pub mod code_generator;
pub mod error;
pub mod qr;
