// Job class registry
//
// Resolves class names to the executable units a host application has
// registered. Resolution failure is how `add_job` detects unknown classes.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// JobClass is a registered executable unit.
///
/// Jobs inherit their execution flags from their class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobClass {
    pub name: String,
    #[serde(default)]
    pub concurrent_execution_disallowed: bool,
    #[serde(default)]
    pub persist_job_data_after_execution: bool,
}

impl JobClass {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            concurrent_execution_disallowed: false,
            persist_job_data_after_execution: false,
        }
    }

    pub fn with_concurrent_execution_disallowed(mut self) -> Self {
        self.concurrent_execution_disallowed = true;
        self
    }

    pub fn with_persisted_job_data(mut self) -> Self {
        self.persist_job_data_after_execution = true;
        self
    }
}

/// Registry of job classes known to this process
#[derive(Debug, Clone, Default)]
pub struct JobClassRegistry {
    classes: HashMap<String, JobClass>,
}

impl JobClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class, replacing any class with the same name
    pub fn register(&mut self, class: JobClass) -> &mut Self {
        debug!(class = %class.name, "Registering job class");
        self.classes.insert(class.name.clone(), class);
        self
    }

    pub fn resolve(&self, name: &str) -> Option<JobClass> {
        self.classes.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl FromIterator<JobClass> for JobClassRegistry {
    fn from_iter<I: IntoIterator<Item = JobClass>>(iter: I) -> Self {
        let mut registry = Self::new();
        for class in iter {
            registry.register(class);
        }
        registry
    }
}
