pub mod completion;
pub mod engine;
pub mod error;
pub mod prompts;
pub mod providers;

pub use completion::{CompletionService, ProviderKind, ProviderSettings};
pub use engine::{
    ReflectionEngine, CONNECTIONS_EMPTY_MESSAGE, CONNECTIONS_FAILURE_MESSAGE, REFLECTION_WINDOW_DAYS,
    WEEKLY_EMPTY_MESSAGE, WEEKLY_FAILURE_MESSAGE,
};
pub use error::{CompletionError, ReflectionError};
pub use prompts::PromptBuilder;
pub use providers::{build_provider, ClaudeProvider, GeminiProvider, OllamaProvider, OpenAIProvider};
