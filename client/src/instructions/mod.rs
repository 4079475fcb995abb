pub mod ido_instructions;
pub mod rpc;
pub mod utils;
