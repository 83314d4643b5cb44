pub mod compiler;
pub mod constants;
mod parser;
pub mod runtime;
pub mod vm;

pub use self::{
    compiler::{compile, CompilationError, DebugInfo},
    vm::{Status, Vm, VmConfig, VmError},
};
