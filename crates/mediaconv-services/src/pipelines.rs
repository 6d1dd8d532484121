//! Saved pipelines.

use std::sync::Arc;

use mediaconv_core::models::{NewPipeline, PipelineFormat, PipelineRecord};
use mediaconv_core::{AppError, AppResult, PipelineDefinition};
use mediaconv_db::PipelineRepository;

#[derive(Clone)]
pub struct PipelineService {
    repo: Arc<dyn PipelineRepository>,
}

impl PipelineService {
    pub fn new(repo: Arc<dyn PipelineRepository>) -> Self {
        Self { repo }
    }

    /// Parses and compiles `content` before saving it, so a stored pipeline
    /// always maps onto known operations. The record takes `name` when given,
    /// otherwise the name the definition declares.
    #[tracing::instrument(skip(self, content))]
    pub async fn save(
        &self,
        user_id: i64,
        name: Option<&str>,
        format: PipelineFormat,
        content: &str,
    ) -> AppResult<PipelineRecord> {
        let definition = PipelineDefinition::parse(content.as_bytes(), format)?;
        definition.compile()?;
        let name = name.unwrap_or(&definition.name);

        let record = self
            .repo
            .create(NewPipeline {
                user_id,
                name: name.to_string(),
                format,
                content: content.to_string(),
            })
            .await?;
        tracing::info!(pipeline_id = record.id, name = %record.name, "Pipeline saved");
        Ok(record)
    }

    pub async fn find_by_name(&self, user_id: i64, name: &str) -> AppResult<Option<PipelineRecord>> {
        self.repo.find_by_name(user_id, name).await
    }

    pub async fn get(&self, id: i64) -> AppResult<PipelineRecord> {
        self.repo
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("pipeline {} not found", id)))
    }

    pub async fn list(&self, user_id: i64) -> AppResult<Vec<PipelineRecord>> {
        self.repo.list_for_user(user_id).await
    }

    /// Definition stored in a saved pipeline, parsed by its format.
    pub fn definition(record: &PipelineRecord) -> AppResult<PipelineDefinition> {
        PipelineDefinition::parse(record.content.as_bytes(), record.format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediaconv_db::InMemoryCatalog;

    const THUMB_YAML: &str = r#"
name: thumb
steps:
  - operation: generate_thumbnail
    input: ${input}
    output: ${output}/thumb.jpg
    params:
      type: image
      width: 320
      height: 240
"#;

    #[tokio::test]
    async fn test_save_and_lookup() {
        let service = PipelineService::new(Arc::new(InMemoryCatalog::new()));
        let record = service
            .save(1, None, PipelineFormat::Yaml, THUMB_YAML)
            .await
            .unwrap();
        assert_eq!(record.name, "thumb");

        let found = service.find_by_name(1, "thumb").await.unwrap().unwrap();
        assert_eq!(found.id, record.id);
        assert!(service.find_by_name(2, "thumb").await.unwrap().is_none());

        let definition = PipelineService::definition(&found).unwrap();
        assert_eq!(definition.steps.len(), 1);

        let renamed = service
            .save(1, Some("thumb-small"), PipelineFormat::Yaml, THUMB_YAML)
            .await
            .unwrap();
        assert_eq!(renamed.name, "thumb-small");
        assert_eq!(service.list(1).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_rejects_invalid_pipelines() {
        let service = PipelineService::new(Arc::new(InMemoryCatalog::new()));

        let unknown_op = r#"{"name":"x","steps":[{"operation":"blur","input":"${input}","output":"${output}/x"}]}"#;
        assert!(matches!(
            service.save(1, None, PipelineFormat::Json, unknown_op).await,
            Err(AppError::Validation(_))
        ));

        let no_steps = r#"{"name":"x","steps":[]}"#;
        assert!(matches!(
            service.save(1, None, PipelineFormat::Json, no_steps).await,
            Err(AppError::Validation(_))
        ));

        service
            .save(1, None, PipelineFormat::Yaml, THUMB_YAML)
            .await
            .unwrap();
        assert!(matches!(
            service.save(1, None, PipelineFormat::Yaml, THUMB_YAML).await,
            Err(AppError::Conflict(_))
        ));
    }
}
