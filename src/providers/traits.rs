use async_trait::async_trait;
use anyhow::Result;
use std::any::Any;

#[async_trait]
pub trait CompletionProvider: Any + Send + Sync {
    async fn new(api_key: String) -> Result<Self>
    where
        Self: Sized;

    async fn complete(&self, prompt: &str) -> Result<String>;

    async fn get_model_info(&self) -> Result<String>;

    fn clone_box(&self) -> Box<dyn CompletionProvider + Send + Sync>;
}

impl Clone for Box<dyn CompletionProvider + Send + Sync> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}
