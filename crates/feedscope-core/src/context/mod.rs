pub mod system_prompt;

pub use system_prompt::{SystemPromptBuilder, SYSTEM_PROMPT};
