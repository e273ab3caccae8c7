//! LLM-driven reasoning and review prompts.
//!
//! The plugin only prepares prompts; answering them is the job of the
//! `llm` plugin it depends on.

use async_trait::async_trait;
use entity_plugin::prelude::*;
use serde_json::Value;
use tracing::debug;

use crate::STDLIB_VERSION;
use crate::config::{self, PromptConfig};

/// Key of the prompt built in the `think` stage.
pub const PROMPT_KEY: &str = "prompt";
/// Key of the prompt built in the `review` stage.
pub const REVIEW_PROMPT_KEY: &str = "review_prompt";

/// Builds the `think` and `review` prompts.
#[derive(Debug)]
pub struct PromptPlugin {
    descriptor: PluginDescriptor,
}

impl PromptPlugin {
    /// Registry identity.
    pub const IDENTITY: &'static str = "prompt";
    /// Identity of the required language model plugin.
    pub const LLM: &'static str = "llm";

    /// Creates the plugin with its `llm` dependency.
    pub fn new() -> Self {
        Self {
            descriptor: PluginDescriptor::new(Self::IDENTITY, STDLIB_VERSION)
                .with_description("LLM-driven reasoning or validation")
                .with_capability("prompt")
                .depends_on(Self::LLM)
                .with_hooks([HookPoint::Think, HookPoint::Review])
                .with_schema(PromptConfig::schema()),
        }
    }
}

impl Default for PromptPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Plugin for PromptPlugin {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    fn validate_config(&self, config: &Value) -> Result<(), ConfigViolation> {
        config::parse::<PromptConfig>(config).map(|_| ())
    }

    async fn activate(&self, ctx: ActivationContext) -> anyhow::Result<Box<dyn PluginInstance>> {
        let config: PromptConfig = ctx.config_as()?;
        if let Some(version) = ctx.dependencies.get(Self::LLM) {
            debug!(llm_version = %version, "Prompt plugin bound to llm");
        }
        Ok(Box::new(Prompt { config }))
    }
}

#[derive(Debug)]
struct Prompt {
    config: PromptConfig,
}

#[async_trait]
impl PluginInstance for Prompt {
    async fn on_hook(&self, mut payload: HookPayload) -> anyhow::Result<HookResult> {
        let (key, instructions) = match payload.hook {
            HookPoint::Think => (PROMPT_KEY, &self.config.system_prompt),
            HookPoint::Review => (REVIEW_PROMPT_KEY, &self.config.review_prompt),
            other => anyhow::bail!("prompt plugin does not handle '{other}'"),
        };

        let prompt = format!("{instructions}\n\n{}", payload.message);
        payload.insert(key, Value::String(prompt));
        Ok(HookResult::continue_with(payload))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use entity_plugin::{ActivationOutcome, LifecycleManager, PluginRegistry};
    use serde_json::json;

    #[derive(Debug)]
    struct Llm {
        descriptor: PluginDescriptor,
    }

    #[async_trait]
    impl Plugin for Llm {
        fn descriptor(&self) -> &PluginDescriptor {
            &self.descriptor
        }

        async fn activate(&self, _ctx: ActivationContext) -> anyhow::Result<Box<dyn PluginInstance>> {
            Ok(ClosureInstance::new("llm", |payload| async move {
                Ok(HookResult::continue_with(payload))
            })
            .boxed())
        }
    }

    #[tokio::test]
    async fn test_requires_llm() {
        let registry = Arc::new(PluginRegistry::new());
        registry.register(Arc::new(PromptPlugin::new())).await.unwrap();

        let err = LifecycleManager::new(registry).activate_all().await.unwrap_err();
        assert!(matches!(err, PluginError::MissingDependency { identity, .. } if identity == "llm"));
    }

    #[tokio::test]
    async fn test_builds_think_and_review_prompts() {
        let registry = Arc::new(PluginRegistry::new());
        registry
            .register(Arc::new(Llm {
                descriptor: PluginDescriptor::new("llm", Version::new(2, 0, 0)),
            }))
            .await
            .unwrap();
        registry
            .register_with_config(
                Arc::new(PromptPlugin::new()),
                json!({ "system_prompt": "Be terse." }),
            )
            .await
            .unwrap();

        let manager = LifecycleManager::new(registry);
        let report = manager.activate_all().await.unwrap();
        assert_eq!(report.active(), vec!["llm", "prompt"]);
        assert!(matches!(report.outcome("prompt"), Some(ActivationOutcome::Activated)));

        let think = manager
            .dispatcher()
            .run_chain(HookPayload::new(HookPoint::Think).with_message("2+2?"))
            .await
            .unwrap();
        assert_eq!(think.payload.get_string(PROMPT_KEY), Some("Be terse.\n\n2+2?"));

        let review = manager
            .dispatcher()
            .run_chain(think.payload.retarget(HookPoint::Review))
            .await
            .unwrap();
        let review_prompt = review.payload.get_string(REVIEW_PROMPT_KEY).unwrap();
        assert!(review_prompt.starts_with("Review the answer"));
        assert!(review_prompt.ends_with("2+2?"));
    }
}
