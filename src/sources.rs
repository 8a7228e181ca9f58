//! Repository source lookups.
//!
//! Feed configuration names the repository source that imported data is
//! attributed to. Whether a source exists is owned by the host repository;
//! the connector only asks through [`SourceRegistry`].

use std::collections::BTreeSet;

/// Answers "does this named source exist".
pub trait SourceRegistry: Send + Sync {
    fn source_exists(&self, name: &str) -> bool;
}

/// A fixed set of source names, typically from the application config.
#[derive(Debug, Clone, Default)]
pub struct StaticSources {
    names: BTreeSet<String>,
}

impl StaticSources {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

impl SourceRegistry for StaticSources {
    fn source_exists(&self, name: &str) -> bool {
        self.names.contains(name)
    }
}

impl<F> SourceRegistry for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn source_exists(&self, name: &str) -> bool {
        self(name)
    }
}
