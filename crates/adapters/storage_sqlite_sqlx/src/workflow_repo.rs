//! `SQLite` implementation of [`WorkflowRepository`].

use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use autoflow_app::ports::WorkflowRepository;
use autoflow_domain::error::AutoflowError;
use autoflow_domain::id::WorkflowId;
use autoflow_domain::workflow::Workflow;

use crate::decode_err;
use crate::error::StorageError;

struct Wrapper(Workflow);

impl Wrapper {
    fn maybe(value: Option<Self>) -> Option<Workflow> {
        value.map(|w| w.0)
    }
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let name: String = row.try_get("name")?;
        let enabled: bool = row.try_get("enabled")?;
        let definition: String = row.try_get("definition")?;

        let id = WorkflowId::from_str(&id).map_err(decode_err)?;
        let mut workflow: Workflow = serde_json::from_str(&definition).map_err(decode_err)?;
        workflow.id = id;
        workflow.name = name;
        workflow.enabled = enabled;

        Ok(Self(workflow))
    }
}

/// `SQLite`-backed workflow repository.
pub struct SqliteWorkflowRepository {
    pool: SqlitePool,
}

impl SqliteWorkflowRepository {
    /// Create a new repository backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl WorkflowRepository for SqliteWorkflowRepository {
    async fn create(&self, workflow: Workflow) -> Result<Workflow, AutoflowError> {
        let definition = serde_json::to_string(&workflow).map_err(StorageError::from)?;

        sqlx::query("INSERT INTO workflows (id, name, enabled, definition) VALUES (?, ?, ?, ?)")
            .bind(workflow.id.to_string())
            .bind(&workflow.name)
            .bind(workflow.enabled)
            .bind(&definition)
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(workflow)
    }

    async fn get_by_id(&self, id: WorkflowId) -> Result<Option<Workflow>, AutoflowError> {
        let row: Option<Wrapper> = sqlx::query_as("SELECT * FROM workflows WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(Wrapper::maybe(row))
    }

    async fn get_all(&self) -> Result<Vec<Workflow>, AutoflowError> {
        let rows: Vec<Wrapper> = sqlx::query_as("SELECT * FROM workflows ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn update(&self, workflow: Workflow) -> Result<Workflow, AutoflowError> {
        let definition = serde_json::to_string(&workflow).map_err(StorageError::from)?;

        sqlx::query("UPDATE workflows SET name = ?, enabled = ?, definition = ? WHERE id = ?")
            .bind(&workflow.name)
            .bind(workflow.enabled)
            .bind(&definition)
            .bind(workflow.id.to_string())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(workflow)
    }

    async fn delete(&self, id: WorkflowId) -> Result<(), AutoflowError> {
        sqlx::query("DELETE FROM workflows WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Config;
    use autoflow_domain::workflow::{BranchConfig, Condition, LoopConfig, Node, Operator, Port, kinds};
    use serde_json::json;

    async fn setup() -> SqliteWorkflowRepository {
        let db = Config::new("sqlite::memory:")
            .build()
            .await
            .unwrap();
        SqliteWorkflowRepository::new(db.pool().clone())
    }

    fn valid_workflow(name: &str) -> Workflow {
        Workflow::builder()
            .name(name)
            .node(Node::trigger("start", kinds::MANUAL_TRIGGER))
            .node(Node::action("log", kinds::LOG, json!({"message": "hi"})))
            .edge("start", "log", Port::Default)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn should_create_and_retrieve_workflow() {
        let repo = setup().await;
        let workflow = valid_workflow("Morning");
        let id = workflow.id;

        repo.create(workflow).await.unwrap();
        let fetched = repo.get_by_id(id).await.unwrap().unwrap();

        assert_eq!(fetched.id, id);
        assert_eq!(fetched.name, "Morning");
        assert!(fetched.enabled);
        assert_eq!(fetched.nodes().len(), 2);
        assert_eq!(fetched.edges().len(), 1);
    }

    #[tokio::test]
    async fn should_return_none_when_workflow_not_found() {
        let repo = setup().await;
        let result = repo.get_by_id(WorkflowId::new()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn should_list_workflows_by_name() {
        let repo = setup().await;
        repo.create(valid_workflow("Zeta")).await.unwrap();
        repo.create(valid_workflow("Alpha")).await.unwrap();

        let names: Vec<String> = repo
            .get_all()
            .await
            .unwrap()
            .into_iter()
            .map(|w| w.name)
            .collect();

        assert_eq!(names, vec!["Alpha", "Zeta"]);
    }

    #[tokio::test]
    async fn should_update_workflow() {
        let repo = setup().await;
        let workflow = valid_workflow("Before");
        let id = workflow.id;
        repo.create(workflow).await.unwrap();

        let mut fetched = repo.get_by_id(id).await.unwrap().unwrap();
        fetched.name = "After".to_string();
        fetched.enabled = false;
        repo.update(fetched).await.unwrap();

        let updated = repo.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(updated.name, "After");
        assert!(!updated.enabled);
    }

    #[tokio::test]
    async fn should_delete_workflow() {
        let repo = setup().await;
        let workflow = valid_workflow("Gone");
        let id = workflow.id;
        repo.create(workflow).await.unwrap();

        repo.delete(id).await.unwrap();

        assert!(repo.get_by_id(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn should_preserve_branch_and_loop_nodes_through_storage() {
        let repo = setup().await;
        let workflow = Workflow::builder()
            .name("Complex")
            .node(Node::trigger("start", kinds::MANUAL_TRIGGER))
            .node(Node::looping("each", LoopConfig::for_each("{{contacts}}")))
            .node(Node::branch(
                "check",
                BranchConfig::all(vec![Condition::new("{{item}}", Operator::IsEmpty, "")]),
            ))
            .node(Node::action("log", kinds::LOG, json!({"message": "{{item}}"})))
            .edge("start", "each", Port::Default)
            .edge("each", "check", Port::Loop)
            .edge("check", "log", Port::False)
            .build()
            .unwrap();
        let id = workflow.id;

        repo.create(workflow.clone()).await.unwrap();
        let fetched = repo.get_by_id(id).await.unwrap().unwrap();

        assert_eq!(
            serde_json::to_value(&fetched).unwrap(),
            serde_json::to_value(&workflow).unwrap()
        );
    }
}
