pub mod codegen;
pub mod export;
pub mod inputs;
pub mod logic;
