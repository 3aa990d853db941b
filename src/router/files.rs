//! `/files/{name}`: download and upload inside the configured directory.
//!
//! Names are validated before the filesystem is touched, so a request can
//! never address anything outside the files directory.

use std::io::ErrorKind;
use std::path::{Component, Path};

use thiserror::Error;
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{error, info, warn};

use crate::http::{Method, Request, Response, ResponseError};

/// Why a file name was refused.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FileNameError {
    #[error("file name is empty")]
    Empty,

    #[error("file name contains invalid path separators")]
    Separator,

    #[error("file name must not start with a dot")]
    Hidden,

    #[error("file name contains path elements")]
    PathElements,
}

/// Accepts only a single plain path component.
///
/// # Examples
///
/// ```
/// use filedrop::router::files::{validate_file_name, FileNameError};
///
/// assert!(validate_file_name("report.txt").is_ok());
/// assert_eq!(validate_file_name("../etc/passwd"), Err(FileNameError::Separator));
/// assert_eq!(validate_file_name(".env"), Err(FileNameError::Hidden));
/// ```
pub fn validate_file_name(name: &str) -> Result<(), FileNameError> {
    if name.is_empty() {
        return Err(FileNameError::Empty);
    }
    if name.contains(['/', '\\']) {
        return Err(FileNameError::Separator);
    }
    if name.starts_with('.') {
        return Err(FileNameError::Hidden);
    }
    if name.contains("..") || name.contains('\0') {
        return Err(FileNameError::PathElements);
    }

    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(part)), None) if part == name => Ok(()),
        _ => Err(FileNameError::PathElements),
    }
}

/// Entry point for the files endpoint; branches on method.
pub async fn serve<W>(
    name: &str,
    request: &Request,
    response: &mut Response<'_, W>,
) -> Result<(), ResponseError>
where
    W: AsyncWrite + Unpin,
{
    match request.method() {
        Method::Get => get_file(name, request, response).await,
        Method::Post => post_file(name, request, response).await,
        other => {
            warn!(method = %other, "unsupported method on /files");
            response
                .status_not_implemented()
                .text("Method not supported")
                .await
        }
    }
}

/// Streams `name` from the files directory.
pub async fn get_file<W>(
    name: &str,
    request: &Request,
    response: &mut Response<'_, W>,
) -> Result<(), ResponseError>
where
    W: AsyncWrite + Unpin,
{
    if name.is_empty() {
        return response
            .status_not_found()
            .text("Name of file is not passed in URL")
            .await;
    }

    if let Err(e) = validate_file_name(name) {
        return response
            .status_bad_request()
            .text(format!("Invalid file name: {e}"))
            .await;
    }

    let Some(directory) = available_directory(request).await else {
        return unavailable(response).await;
    };

    let path = directory.join(name);
    match fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => {}
        Ok(_) => return file_not_found(name, directory, response).await,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return file_not_found(name, directory, response).await;
        }
        Err(e) => {
            error!(path = %path.display(), error = %e, "cannot stat requested file");
            return unavailable(response).await;
        }
    }

    response
        .set_header("Content-Disposition", format!("inline; filename=\"{name}\""))
        .status_ok()
        .local_file(&path)
        .await
}

/// Stores the request body as a new file called `name`.
///
/// Never overwrites: an existing name answers `409 Conflict`.
pub async fn post_file<W>(
    name: &str,
    request: &Request,
    response: &mut Response<'_, W>,
) -> Result<(), ResponseError>
where
    W: AsyncWrite + Unpin,
{
    if let Err(e) = validate_file_name(name) {
        return response
            .status_bad_request()
            .text(format!("Invalid file name: {e}"))
            .await;
    }

    let Some(directory) = available_directory(request).await else {
        return unavailable(response).await;
    };

    let path = directory.join(name);
    let mut file = match OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .await
    {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            info!(file = name, "conflict: file already exists");
            return response.status_conflict().send().await;
        }
        Err(e) => {
            error!(path = %path.display(), error = %e, "failed to create file");
            return response
                .status_internal_error()
                .text("Failed to save file")
                .await;
        }
    };

    let written = async {
        file.write_all(request.body()).await?;
        file.flush().await
    }
    .await;

    if let Err(e) = written {
        error!(path = %path.display(), error = %e, "failed to write file");
        drop(file);
        if let Err(e) = fs::remove_file(&path).await {
            warn!(path = %path.display(), error = %e, "failed to remove partial upload");
        }
        return response
            .status_internal_error()
            .text("Failed to save file")
            .await;
    }

    if let Some(missing) = missing_body_bytes(request) {
        warn!(
            file = name,
            declared = request.content_length().unwrap_or_default(),
            received = request.body().len(),
            missing,
            "upload was cut off at the request size limit, stored truncated"
        );
    }

    info!(file = name, bytes = request.body().len(), "file stored");
    response.status_created().send().await
}

// How many body bytes `Content-Length` promised but the request lacks.
fn missing_body_bytes(request: &Request) -> Option<usize> {
    let declared = request.content_length()?;
    declared
        .checked_sub(request.body().len())
        .filter(|&missing| missing > 0)
}

// The configured directory, if there is one and it is a directory.
async fn available_directory(request: &Request) -> Option<&Path> {
    let directory = request.config().files_directory()?;
    match fs::metadata(directory).await {
        Ok(meta) if meta.is_dir() => Some(directory),
        Ok(_) => {
            error!(directory = %directory.display(), "files directory is not a directory");
            None
        }
        Err(e) => {
            error!(directory = %directory.display(), error = %e, "files directory is unavailable");
            None
        }
    }
}

async fn unavailable<W>(response: &mut Response<'_, W>) -> Result<(), ResponseError>
where
    W: AsyncWrite + Unpin,
{
    response
        .status_internal_error()
        .text("File server feature is not available!")
        .await
}

async fn file_not_found<W>(
    name: &str,
    directory: &Path,
    response: &mut Response<'_, W>,
) -> Result<(), ResponseError>
where
    W: AsyncWrite + Unpin,
{
    info!(file = name, directory = %directory.display(), "requested file does not exist");
    response
        .status_not_found()
        .text("Requested file not found")
        .await
}
