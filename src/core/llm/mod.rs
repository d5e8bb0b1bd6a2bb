//! LLM capability with a closed provider set.
//!
//! Provider selection happens once at construction from a validated name;
//! credentials resolve from an explicit argument or the provider's
//! environment variable and missing credentials fail construction, not
//! first use. Each `generate` call is a single blocking HTTP request with
//! no retries and no client-side timeout.

mod anthropic;
mod openai;

pub use anthropic::AnthropicProvider;
pub use openai::OpenAiProvider;

use crate::core::error::{Error, Result};

/// Token budget for generated commit messages.
const COMMIT_MESSAGE_MAX_TOKENS: u32 = 100;

/// Per-call overrides layered over the client defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenerateOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// The supported providers. The set is closed: an unknown name fails
/// client construction.
#[derive(Debug, Clone)]
pub enum Provider {
    OpenAi(OpenAiProvider),
    Anthropic(AnthropicProvider),
}

/// Provider-polymorphic text generation client.
#[derive(Debug, Clone)]
pub struct LlmClient {
    provider: Provider,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl LlmClient {
    /// Build a client for `provider`, using the provider default model
    /// when none is given.
    ///
    /// # Errors
    ///
    /// `UnsupportedProvider` for a name outside the supported set;
    /// `MissingCredential` when neither `api_key` nor the provider's
    /// environment variable yields a key.
    pub fn new(
        provider: &str,
        model: Option<String>,
        temperature: f32,
        max_tokens: u32,
        api_key: Option<String>,
    ) -> Result<Self> {
        let name = provider.to_lowercase();
        let (provider, model) = match name.as_str() {
            "openai" => {
                let key = resolve_key(api_key, "OPENAI_API_KEY")
                    .ok_or_else(|| Error::MissingCredential("openai".to_string()))?;
                let model = model.unwrap_or_else(|| openai::DEFAULT_MODEL.to_string());
                (Provider::OpenAi(OpenAiProvider::new(key)), model)
            }
            "anthropic" => {
                let key = resolve_key(api_key, "ANTHROPIC_API_KEY")
                    .ok_or_else(|| Error::MissingCredential("anthropic".to_string()))?;
                let model = model.unwrap_or_else(|| anthropic::DEFAULT_MODEL.to_string());
                (Provider::Anthropic(AnthropicProvider::new(key)), model)
            }
            _ => return Err(Error::UnsupportedProvider(provider.to_string())),
        };

        Ok(Self {
            provider,
            model,
            temperature,
            max_tokens,
        })
    }

    /// Name of the selected provider.
    #[must_use]
    pub fn provider_name(&self) -> &'static str {
        match self.provider {
            Provider::OpenAi(_) => "openai",
            Provider::Anthropic(_) => "anthropic",
        }
    }

    /// The model requests are issued against.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Generate text for `prompt`, with `opts` overriding the client
    /// defaults for this call only.
    ///
    /// # Errors
    ///
    /// Transport failures and non-2xx API responses.
    pub fn generate(&self, prompt: &str, opts: GenerateOptions) -> Result<String> {
        let temperature = opts.temperature.unwrap_or(self.temperature);
        let max_tokens = opts.max_tokens.unwrap_or(self.max_tokens);
        match &self.provider {
            Provider::OpenAi(provider) => {
                provider.generate(&self.model, prompt, temperature, max_tokens)
            }
            Provider::Anthropic(provider) => {
                provider.generate(&self.model, prompt, temperature, max_tokens)
            }
        }
    }

    /// Analyze code against a task description.
    ///
    /// # Errors
    ///
    /// See [`LlmClient::generate`].
    pub fn analyze_code(&self, code: &str, task: &str) -> Result<String> {
        self.generate(&analysis_prompt(code, task), GenerateOptions::default())
    }

    /// Produce a refactored version of `code`. The prompt asks for code
    /// only; callers still strip any markdown fences the model adds.
    ///
    /// # Errors
    ///
    /// See [`LlmClient::generate`].
    pub fn refactor_code(&self, code: &str, instructions: &str) -> Result<String> {
        self.generate(&refactor_prompt(code, instructions), GenerateOptions::default())
    }

    /// Generate a commit message from a diff, under a short token budget.
    ///
    /// # Errors
    ///
    /// See [`LlmClient::generate`].
    pub fn commit_message(&self, diff: &str) -> Result<String> {
        self.generate(
            &commit_prompt(diff),
            GenerateOptions {
                max_tokens: Some(COMMIT_MESSAGE_MAX_TOKENS),
                ..GenerateOptions::default()
            },
        )
    }
}

fn resolve_key(explicit: Option<String>, env_var: &str) -> Option<String> {
    explicit
        .filter(|key| !key.is_empty())
        .or_else(|| std::env::var(env_var).ok().filter(|key| !key.is_empty()))
}

fn analysis_prompt(code: &str, task: &str) -> String {
    format!(
        "Analyze the following code and provide suggestions for: {task}\n\n\
         Code:\n```\n{code}\n```\n\n\
         Provide a clear analysis and actionable suggestions."
    )
}

fn refactor_prompt(code: &str, instructions: &str) -> String {
    format!(
        "Refactor the following code according to these instructions: {instructions}\n\n\
         Original code:\n```\n{code}\n```\n\n\
         Provide ONLY the refactored code without explanations."
    )
}

fn commit_prompt(diff: &str) -> String {
    format!(
        "Generate a concise commit message for the following changes:\n\n\
         ```\n{diff}\n```\n\n\
         Provide only the commit message in conventional commit format."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_provider_is_rejected() {
        let result = LlmClient::new("llamacpp", None, 0.7, 2000, Some("key".to_string()));
        assert!(matches!(result, Err(Error::UnsupportedProvider(_))));
    }

    #[test]
    fn provider_name_is_case_insensitive() {
        let client = LlmClient::new("Anthropic", None, 0.7, 2000, Some("key".to_string())).unwrap();
        assert_eq!(client.provider_name(), "anthropic");
    }

    #[test]
    fn explicit_key_satisfies_credential_resolution() {
        let client = LlmClient::new("openai", None, 0.7, 2000, Some("explicit".to_string()));
        assert!(client.is_ok());
    }

    #[test]
    fn empty_explicit_key_counts_as_missing() {
        assert_eq!(resolve_key(Some(String::new()), "REVA_NO_SUCH_VAR"), None);
        assert_eq!(
            resolve_key(Some("key".to_string()), "REVA_NO_SUCH_VAR").as_deref(),
            Some("key")
        );
    }

    #[test]
    fn default_model_is_provider_specific() {
        let openai = LlmClient::new("openai", None, 0.7, 2000, Some("k".to_string())).unwrap();
        let anthropic =
            LlmClient::new("anthropic", None, 0.7, 2000, Some("k".to_string())).unwrap();
        assert_ne!(openai.model(), anthropic.model());
    }

    #[test]
    fn explicit_model_wins() {
        let client = LlmClient::new(
            "openai",
            Some("gpt-4o-mini".to_string()),
            0.7,
            2000,
            Some("k".to_string()),
        )
        .unwrap();
        assert_eq!(client.model(), "gpt-4o-mini");
    }

    #[test]
    fn prompts_embed_their_inputs() {
        let prompt = analysis_prompt("fn main() {}", "find bugs");
        assert!(prompt.contains("find bugs"));
        assert!(prompt.contains("fn main() {}"));

        let prompt = refactor_prompt("fn main() {}", "use iterators");
        assert!(prompt.contains("use iterators"));
        assert!(prompt.contains("ONLY the refactored code"));

        let prompt = commit_prompt("+ added line");
        assert!(prompt.contains("+ added line"));
        assert!(prompt.contains("conventional commit"));
    }
}
