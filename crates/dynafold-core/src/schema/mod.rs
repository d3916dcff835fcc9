//! Schema evolution: an ordered chain of versioned record shapes with
//! forward migration functions. Stored documents decode from whatever
//! version they carry up to the latest; encoding only ever happens at the
//! latest version.

mod shape;


use crate::{
    meta,
    value::Document,
};
use std::fmt;
use std::sync::Arc;
use thiserror::Error as ThisError;

pub use shape::{FieldDef, Shape, ShapeViolation};

///
/// SchemaError
///
/// Always local to a decode/encode; never retried.
///

#[derive(Debug, ThisError)]
pub enum SchemaError {
    #[error("document carries no readable version tag")]
    MissingVersionTag,

    #[error("version {version} is not in the schema chain")]
    UnknownVersion { version: u32 },

    #[error("validation failed at version {version}: {violation}")]
    ValidationFailed {
        version: u32,
        violation: ShapeViolation,
    },

    #[error("migration {from} -> {to} failed: {message}")]
    MigrationFailed { from: u32, to: u32, message: String },
}

///
/// ChainError
///
/// Construction-time defects in a version chain; raised once while building
/// the entity definition, never during operations.
///

#[derive(Debug, ThisError)]
pub enum ChainError {
    #[error("schema chain has no versions")]
    Empty,

    #[error("version {version} does not follow {previous}")]
    NonMonotonic { previous: u32, version: u32 },

    #[error("version {version} has no migration from its predecessor")]
    MissingMigration { version: u32 },
}

/// Forward migration from the previous version's shape to this one's.
pub type Migration = Arc<dyn Fn(Document) -> Result<Document, String> + Send + Sync>;

///
/// VersionDef
///

#[derive(Clone)]
pub struct VersionDef {
    version: u32,
    shape: Shape,
    migrate: Option<Migration>,
}

impl VersionDef {
    /// The chain's first version; it has nothing to migrate from.
    #[must_use]
    pub const fn initial(version: u32, shape: Shape) -> Self {
        Self {
            version,
            shape,
            migrate: None,
        }
    }

    #[must_use]
    pub fn new(
        version: u32,
        shape: Shape,
        migrate: impl Fn(Document) -> Result<Document, String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            version,
            shape,
            migrate: Some(Arc::new(migrate)),
        }
    }
}

impl fmt::Debug for VersionDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VersionDef")
            .field("version", &self.version)
            .field("shape", &self.shape)
            .field("migrate", &self.migrate.as_ref().map(|_| ".."))
            .finish()
    }
}

///
/// SchemaChain
///
/// Ordered `[v1..vN]`. Monotonic and total: every version after the first
/// carries a migration, checked once at construction. Decode folds forward
/// only; there is no down-migration and no branching.
///

#[derive(Clone, Debug)]
pub struct SchemaChain {
    versions: Vec<VersionDef>,
}

impl SchemaChain {
    pub fn new(versions: Vec<VersionDef>) -> Result<Self, ChainError> {
        let Some(first) = versions.first() else {
            return Err(ChainError::Empty);
        };

        let mut previous = first.version;
        for def in &versions[1..] {
            if def.version <= previous {
                return Err(ChainError::NonMonotonic {
                    previous,
                    version: def.version,
                });
            }
            if def.migrate.is_none() {
                return Err(ChainError::MissingMigration {
                    version: def.version,
                });
            }
            previous = def.version;
        }

        Ok(Self { versions })
    }

    #[must_use]
    pub fn latest(&self) -> u32 {
        self.versions
            .last()
            .map(|def| def.version)
            .unwrap_or_default()
    }

    fn latest_def(&self) -> &VersionDef {
        // Non-empty by construction.
        self.versions.last().expect("schema chain is never empty")
    }

    fn position_of(&self, version: u32) -> Option<usize> {
        self.versions.iter().position(|def| def.version == version)
    }

    /// Decode a stored document to the latest shape: read the version tag,
    /// validate against that version, fold every subsequent migration in
    /// chain order, restamp.
    pub fn decode(&self, stored: Document) -> Result<Document, SchemaError> {
        let version = meta::read_version(&stored).ok_or(SchemaError::MissingVersionTag)?;
        let start = self
            .position_of(version)
            .ok_or(SchemaError::UnknownVersion { version })?;

        self.versions[start]
            .shape
            .validate(&stored)
            .map_err(|violation| SchemaError::ValidationFailed { version, violation })?;

        let mut doc = stored;
        let mut from = version;
        for def in &self.versions[start + 1..] {
            let migrate = def
                .migrate
                .as_ref()
                .expect("non-initial versions carry a migration");
            doc = migrate(doc).map_err(|message| SchemaError::MigrationFailed {
                from,
                to: def.version,
                message,
            })?;
            from = def.version;
        }

        meta::stamp_version(&mut doc, self.latest());

        Ok(doc)
    }

    /// Validate against the latest shape and stamp the latest version tag.
    pub fn encode(&self, mut doc: Document) -> Result<Document, SchemaError> {
        let latest = self.latest_def();
        latest.shape.validate(&doc).map_err(|violation| {
            SchemaError::ValidationFailed {
                version: latest.version,
                violation,
            }
        })?;
        meta::stamp_version(&mut doc, latest.version);

        Ok(doc)
    }

    /// Prepare a fresh record: fill declared defaults, validate against the
    /// latest shape, stamp the latest version. No migration runs.
    pub fn make(&self, mut doc: Document) -> Result<Document, SchemaError> {
        let latest = self.latest_def();
        latest.shape.apply_defaults(&mut doc);

        self.encode(doc)
    }

    /// The latest shape, for callers that need default/dependency info.
    #[must_use]
    pub fn latest_shape(&self) -> &Shape {
        &self.latest_def().shape
    }
}
