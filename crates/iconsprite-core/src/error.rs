use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpriteError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

pub type Result<T> = std::result::Result<T, SpriteError>;

/// Why an icon could not be turned into a symbol.
///
/// Failures are values cached for the rest of a generation; they never abort
/// a build, the icon is just left out of the sprite.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadFailure {
    #[error("Malformed icon id: {0}")]
    MalformedId(crate::types::IconId),

    #[error("No icon directory configured for {0}")]
    UnresolvablePrefix(crate::types::IconId),

    #[error("Icon {id}: cannot read {path}: {reason}")]
    MissingFile {
        id: crate::types::IconId,
        path: String,
        reason: String,
    },

    #[error("Icon {id}: {path} contains no <svg> element")]
    InvalidGraphic {
        id: crate::types::IconId,
        path: String,
    },

    #[error("Icon {id}: {path} has no usable viewBox")]
    MissingSizeBox {
        id: crate::types::IconId,
        path: String,
    },
}

impl LoadFailure {
    /// Content problems get one diagnostic; id/prefix mismatches stay silent.
    pub fn is_warnable(&self) -> bool {
        matches!(
            self,
            Self::MissingFile { .. } | Self::InvalidGraphic { .. } | Self::MissingSizeBox { .. }
        )
    }
}
