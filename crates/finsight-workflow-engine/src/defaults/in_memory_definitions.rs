//! In-memory workflow definition source.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::errors::DefinitionError;
use crate::traits::DefinitionSource;
use crate::types::WorkflowDefinition;

/// In-memory implementation of [`DefinitionSource`], keyed by workflow id.
pub struct InMemoryDefinitions {
    definitions: RwLock<BTreeMap<String, WorkflowDefinition>>,
}

impl InMemoryDefinitions {
    pub fn new() -> Self {
        Self {
            definitions: RwLock::new(BTreeMap::new()),
        }
    }

    /// Register a definition under its own id, replacing any previous one.
    pub async fn insert(&self, definition: WorkflowDefinition) {
        self.definitions
            .write()
            .await
            .insert(definition.id.clone(), definition);
    }
}

impl Default for InMemoryDefinitions {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DefinitionSource for InMemoryDefinitions {
    async fn load_definition(
        &self,
        workflow_id: &str,
    ) -> Result<WorkflowDefinition, DefinitionError> {
        self.definitions
            .read()
            .await
            .get(workflow_id)
            .cloned()
            .ok_or_else(|| DefinitionError::NotFound {
                workflow_id: workflow_id.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WORKFLOW_SCHEMA_VERSION;

    fn sample(id: &str) -> WorkflowDefinition {
        WorkflowDefinition {
            schema_version: WORKFLOW_SCHEMA_VERSION,
            id: id.to_string(),
            name: "Sample".into(),
            nodes: vec![],
            edges: vec![],
            metadata: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_load() {
        let source = InMemoryDefinitions::new();
        source.insert(sample("wf-1")).await;

        let def = source.load_definition("wf-1").await.unwrap();
        assert_eq!(def.id, "wf-1");
    }

    #[tokio::test]
    async fn test_missing_definition() {
        let source = InMemoryDefinitions::new();
        let err = source.load_definition("wf-404").await.unwrap_err();
        assert!(matches!(err, DefinitionError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_insert_replaces() {
        let source = InMemoryDefinitions::new();
        source.insert(sample("wf-1")).await;

        let mut updated = sample("wf-1");
        updated.name = "Renamed".into();
        source.insert(updated).await;

        let def = source.load_definition("wf-1").await.unwrap();
        assert_eq!(def.name, "Renamed");
    }
}
