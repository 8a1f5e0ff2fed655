use sea_orm::DbErr;

/// Errors raised by the secure query and repository layer.
///
/// Access denial on queries is not an error: it is expressed as a filter
/// that matches nothing. Repository lookups of rows that are missing or
/// not visible both surface as [`AclError::NotFound`].
#[derive(Debug, thiserror::Error)]
pub enum AclError {
    #[error("database error: {0}")]
    Db(#[from] DbErr),

    #[error("entity not found or not accessible")]
    NotFound,

    #[error("creating '{entity_type}' is not permitted for the current principal")]
    CreateDenied { entity_type: String },

    #[error("entity type '{0}' has no access metadata")]
    UnknownEntity(String),

    #[error("entity type '{entity_type}' is mapped to table '{expected}', query selects '{actual}'")]
    TableMismatch {
        entity_type: String,
        expected: String,
        actual: String,
    },

    #[error("invalid request: {0}")]
    Invalid(&'static str),
}
