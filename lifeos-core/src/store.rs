//! In-memory task, project and user panels seeded with demo data.
//! Nothing here survives a restart.

use std::sync::RwLock;

use thiserror::Error;

use crate::models::{Project, ProjectStatus, Task, User};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum StoreError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: u64 },

    #[error("{kind} {id} already exists")]
    Conflict { kind: &'static str, id: u64 },

    #[error("store lock poisoned")]
    Poisoned,
}

#[derive(Debug)]
pub struct DemoStore {
    tasks: RwLock<Vec<Task>>,
    projects: RwLock<Vec<Project>>,
    users: RwLock<Vec<User>>,
}

impl Default for DemoStore {
    fn default() -> Self {
        Self::seeded()
    }
}

impl DemoStore {
    pub fn seeded() -> Self {
        Self {
            tasks: RwLock::new(vec![
                Task { id: 1, title: "Finish project".to_string(), done: true },
                Task { id: 2, title: "Review PR".to_string(), done: true },
            ]),
            projects: RwLock::new(vec![
                Project { id: 1, name: "LifeOS".to_string(), status: ProjectStatus::Active },
                Project { id: 2, name: "Personal AI".to_string(), status: ProjectStatus::Planning },
            ]),
            users: RwLock::new(vec![
                User { id: 1, name: "Alice".to_string() },
                User { id: 2, name: "Bob".to_string() },
                User { id: 3, name: "Charlie".to_string() },
            ]),
        }
    }

    // --- tasks ---

    pub fn tasks(&self) -> Result<Vec<Task>, StoreError> {
        Ok(self.tasks.read().map_err(|_| StoreError::Poisoned)?.clone())
    }

    pub fn add_task(&self, task: Task) -> Result<Task, StoreError> {
        let mut tasks = self.tasks.write().map_err(|_| StoreError::Poisoned)?;
        if tasks.iter().any(|t| t.id == task.id) {
            return Err(StoreError::Conflict { kind: "task", id: task.id });
        }
        tasks.push(task.clone());
        Ok(task)
    }

    pub fn toggle_task(&self, id: u64) -> Result<Task, StoreError> {
        let mut tasks = self.tasks.write().map_err(|_| StoreError::Poisoned)?;
        let task = tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(StoreError::NotFound { kind: "task", id })?;
        task.done = !task.done;
        Ok(task.clone())
    }

    // --- projects ---

    pub fn projects(&self) -> Result<Vec<Project>, StoreError> {
        Ok(self.projects.read().map_err(|_| StoreError::Poisoned)?.clone())
    }

    pub fn add_project(&self, project: Project) -> Result<Project, StoreError> {
        let mut projects = self.projects.write().map_err(|_| StoreError::Poisoned)?;
        if projects.iter().any(|p| p.id == project.id) {
            return Err(StoreError::Conflict { kind: "project", id: project.id });
        }
        projects.push(project.clone());
        Ok(project)
    }

    /// Move a project to the next status in its cycle.
    pub fn advance_project(&self, id: u64) -> Result<Project, StoreError> {
        let mut projects = self.projects.write().map_err(|_| StoreError::Poisoned)?;
        let project = projects
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(StoreError::NotFound { kind: "project", id })?;
        project.status = project.status.next();
        Ok(project.clone())
    }

    // --- users ---

    pub fn users(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.users.read().map_err(|_| StoreError::Poisoned)?.clone())
    }
}
