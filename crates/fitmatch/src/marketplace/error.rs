use super::repository::RepositoryError;

/// Error taxonomy shared by the marketplace services.
///
/// External capability failures never appear here: screening and matching
/// recover them locally into sentinel results. Repository passthrough is the
/// unexpected bucket and maps to a 5xx at the boundary.
#[derive(Debug, thiserror::Error)]
pub enum MarketplaceError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl MarketplaceError {
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        MarketplaceError::NotFound(what.to_string())
    }

    pub fn forbidden(why: impl std::fmt::Display) -> Self {
        MarketplaceError::Forbidden(why.to_string())
    }

    pub fn conflict(why: impl std::fmt::Display) -> Self {
        MarketplaceError::Conflict(why.to_string())
    }

    pub fn validation(why: impl std::fmt::Display) -> Self {
        MarketplaceError::Validation(why.to_string())
    }
}
