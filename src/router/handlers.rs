//! The small text endpoints.

use tokio::io::AsyncWrite;

use crate::http::{Request, Response, ResponseError};

pub async fn root<W>(response: &mut Response<'_, W>) -> Result<(), ResponseError>
where
    W: AsyncWrite + Unpin,
{
    response.status_ok().send().await
}

/// Answers with `text` exactly as it appeared in the path.
pub async fn echo<W>(text: &str, response: &mut Response<'_, W>) -> Result<(), ResponseError>
where
    W: AsyncWrite + Unpin,
{
    response.status_ok().text(text).await
}

/// Answers with the request's `User-Agent`, or an empty body when there is none.
pub async fn user_agent<W>(
    request: &Request,
    response: &mut Response<'_, W>,
) -> Result<(), ResponseError>
where
    W: AsyncWrite + Unpin,
{
    response.status_ok().text(request.header("user-agent")).await
}

pub async fn not_found<W>(response: &mut Response<'_, W>) -> Result<(), ResponseError>
where
    W: AsyncWrite + Unpin,
{
    response.status_not_found().send().await
}
