//! Project repository - merges imported records with user metadata
//!
//! Projects are rebuilt from both stores on every load. A project seen for
//! the first time gets an all-unset metadata file written immediately, so
//! later loads find it and never rewrite it.

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::project::{Project, ProjectMetadata};
use crate::store::{MetadataStore, RecordStore};

pub struct ProjectRepository {
    records: RecordStore,
    metadata: MetadataStore,
}

impl ProjectRepository {
    pub fn new(records: RecordStore, metadata: MetadataStore) -> Self {
        Self { records, metadata }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            RecordStore::new(config.projects_dir()),
            MetadataStore::new(config.metadata_dir()),
        )
    }

    /// Every project with a record file, in name order.
    ///
    /// A project whose files cannot be read is skipped with a warning.
    pub fn load_all(&self) -> Result<Vec<Project>> {
        let names = self.records.names()?;
        let mut projects = Vec::with_capacity(names.len());

        for name in names {
            match self.build_project(&name) {
                Ok(project) => projects.push(project),
                Err(e) => warn!("Skipping project {}: {}", name, e),
            }
        }

        debug!("Loaded {} projects", projects.len());
        Ok(projects)
    }

    pub fn find(&self, name: &str) -> Result<Option<Project>> {
        Ok(self.load_all()?.into_iter().find(|p| p.name() == name))
    }

    /// Persist the four metadata fields; the record file is never touched
    pub fn save(&self, project: &Project) -> Result<()> {
        self.metadata.save(project.name(), &project.metadata)?;
        info!("Saved metadata for {}", project.name());
        Ok(())
    }

    /// Projects with at least one unset metadata field
    pub fn all_with_no_metadata(&self) -> Result<Vec<Project>> {
        Ok(self
            .load_all()?
            .into_iter()
            .filter(|p| !p.metadata.is_complete())
            .collect())
    }

    fn build_project(&self, name: &str) -> Result<Project> {
        let record = self.records.load(name)?;

        let metadata = match self.metadata.load(name)? {
            Some(metadata) => metadata,
            None => {
                let metadata = ProjectMetadata::default();
                // A failed backfill still yields the project; the next load retries it
                if let Err(e) = self.metadata.save(name, &metadata) {
                    warn!("Failed to write metadata for {}: {}", name, e);
                } else {
                    debug!("Created empty metadata for {}", name);
                }
                metadata
            }
        };

        Ok(Project::new(record, metadata))
    }
}
