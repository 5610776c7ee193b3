// Gateway module for codegen - follows the Train Station Pattern
// All external access must go through this gateway

// Private submodules - not directly accessible from outside
mod extract;
mod generator;
mod prompt;

// Public re-exports - the ONLY way to access codegen functionality
pub use extract::extract_code;
#[cfg(test)]
pub use generator::MockCodeGenerator;
pub use generator::{CodeGenerator, GenerationRequest, LlmCodeGenerator, RepairContext};
pub use prompt::{user_prompt, SYSTEM_PROMPT};
