use vhq_core::storage::{Project, ProjectStore};

pub mod cli;
pub mod commands;
pub mod config;

pub struct AppContext {
    pub store: ProjectStore,
}

impl AppContext {
    pub fn new(store: ProjectStore) -> Self {
        AppContext { store }
    }

    pub async fn project(&self, path: &str) -> anyhow::Result<Project> {
        self.store
            .project(path)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to open project '{}': {}", path, e))
    }
}
