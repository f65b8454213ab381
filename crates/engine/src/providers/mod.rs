pub mod factory;
pub mod instructions;
pub mod mock;
#[cfg(feature = "openai")]
pub mod openai;
pub mod provider;
pub mod registry;
pub mod schema;

pub use factory::{build_registry, build_supervisor, create_provider};
pub use instructions::{InstructionTable, ProviderDescriptor, Specialty};
pub use mock::ScriptedProvider;
#[cfg(feature = "openai")]
pub use openai::OpenAIProvider;
pub use provider::{AnalysisProvider, ProviderError, RawResult};
pub use registry::{ProviderRegistry, ProviderRegistryBuilder, RegisteredProvider};
pub use schema::{extract_json_from_text, normalize, ProviderResult, WireShape};
