//! Request extractors that answer with `ApiError`
//!
//! axum's own `Json`, `Query` and `Path` reject with plain-text bodies and
//! assorted status codes. These wrappers turn every rejection into a 400
//! with the usual error body, keeping the text that names the bad field.

use axum::{
    async_trait,
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRequest, FromRequestParts, Path, Query, Request,
    },
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;

use crate::ApiError;

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// JSON request body
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(ApiJson(value))
    }
}

/// Query string
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(ApiQuery(value))
    }
}

/// Path parameters
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiPath<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state).await?;
        Ok(ApiPath(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{self, StatusCode},
        response::IntoResponse,
    };
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Page {
        limit: u32,
    }

    #[tokio::test]
    async fn test_bad_json_is_bad_request() {
        let request = http::Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"limit":"many"}"#))
            .unwrap();

        let err = ApiJson::<Page>::from_request(request, &()).await.unwrap_err();
        assert!(matches!(&err, ApiError::BadRequest(msg) if msg.contains("limit")));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_missing_content_type_is_bad_request() {
        let request = http::Request::builder()
            .method("POST")
            .uri("/")
            .body(Body::from(r#"{"limit":1}"#))
            .unwrap();

        let err = ApiJson::<Page>::from_request(request, &()).await.unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_bad_query_is_bad_request() {
        let (mut parts, _) = http::Request::builder()
            .uri("/?limit=-1")
            .body(Body::empty())
            .unwrap()
            .into_parts();

        let err = ApiQuery::<Page>::from_request_parts(&mut parts, &()).await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_good_query_parses() {
        let (mut parts, _) = http::Request::builder()
            .uri("/?limit=5")
            .body(Body::empty())
            .unwrap()
            .into_parts();

        let ApiQuery(page) = ApiQuery::<Page>::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(page.limit, 5);
    }
}
