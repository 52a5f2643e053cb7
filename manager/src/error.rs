use actix_web::{HttpResponse, ResponseError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("No workspace is open!")]
    NoWorkspace,

    #[error("Please configure projects before running commands! (Startup Project and Migration Project)")]
    ProjectsNotConfigured,

    #[error("Please enter a migration name!")]
    EmptyMigrationName,

    #[error("No .csproj files found in workspace!")]
    NoProjectFiles,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

#[derive(Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let error_response = ErrorResponse {
            error: self.error_type(),
            message: self.to_string(),
        };

        match self {
            AppError::NoWorkspace
            | AppError::ProjectsNotConfigured
            | AppError::EmptyMigrationName
            | AppError::InvalidRequest(_) => HttpResponse::BadRequest().json(error_response),
            AppError::NoProjectFiles => HttpResponse::NotFound().json(error_response),
            AppError::Config(_)
            | AppError::Io(_)
            | AppError::Serialization(_)
            | AppError::Internal(_) => HttpResponse::InternalServerError().json(error_response),
        }
    }
}

impl AppError {
    fn error_type(&self) -> String {
        match self {
            AppError::Config(_) => "config_error".to_string(),
            AppError::Io(_) => "io_error".to_string(),
            AppError::Serialization(_) => "serialization_error".to_string(),
            AppError::NoWorkspace => "no_workspace".to_string(),
            AppError::ProjectsNotConfigured => "projects_not_configured".to_string(),
            AppError::EmptyMigrationName => "empty_migration_name".to_string(),
            AppError::NoProjectFiles => "no_project_files".to_string(),
            AppError::InvalidRequest(_) => "invalid_request".to_string(),
            AppError::Internal(_) => "internal_error".to_string(),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
