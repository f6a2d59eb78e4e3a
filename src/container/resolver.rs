/*!
 * Definition Resolver
 * Locates container definitions on an ordered list of search paths
 */

use crate::backend::ContainerDefinition;
use log::debug;
use path_clean::PathClean;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Invalid container id {0:?}: must be a single path component")]
    InvalidId(String),

    #[error("No definition for {id:?} in {searched} search path(s)")]
    NotFound { id: String, searched: usize },
}

/// Maps a container id and search paths to a definition
pub trait DefinitionResolver: Send + Sync {
    fn resolve(&self, id: &str, search_paths: &[PathBuf]) -> Result<ContainerDefinition, ResolveError>;
}

/// Default resolver: the first `<search path>/<id>` directory wins
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchPathResolver;

impl SearchPathResolver {
    /// Ids are plain names; anything that could walk the tree is refused
    pub fn validate_id(id: &str) -> Result<(), ResolveError> {
        let mut components = Path::new(id).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) if name == id => Ok(()),
            _ => Err(ResolveError::InvalidId(id.to_string())),
        }
    }
}

impl DefinitionResolver for SearchPathResolver {
    fn resolve(&self, id: &str, search_paths: &[PathBuf]) -> Result<ContainerDefinition, ResolveError> {
        Self::validate_id(id)?;

        for search_path in search_paths {
            let candidate = search_path.join(id).clean();
            if candidate.is_dir() {
                debug!("Resolved container {} to {}", id, candidate.display());
                return Ok(ContainerDefinition::new(id, candidate, search_path.clone()));
            }
        }

        Err(ResolveError::NotFound {
            id: id.to_string(),
            searched: search_paths.len(),
        })
    }
}
