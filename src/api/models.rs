use std::cmp::Ordering;

use tracing::debug;

use crate::api::client::read_json;
use crate::api::{ApiError, ModelInfo, ModelSubType, ModelType, ModelsResponse};
use crate::core::config::Credentials;
use crate::utils::auth::add_auth_headers;
use crate::utils::url::construct_api_url;

/// One uncached, unthrottled `GET /v1/models`.
pub(crate) async fn fetch_models(
    client: &reqwest::Client,
    credentials: &Credentials,
    model_type: Option<ModelType>,
    sub_type: Option<ModelSubType>,
) -> Result<ModelsResponse, ApiError> {
    let models_url = construct_api_url(&credentials.api_url, "v1/models");
    let mut query = Vec::new();
    if let Some(model_type) = model_type {
        query.push(("type", model_type.as_str()));
    }
    if let Some(sub_type) = sub_type {
        query.push(("sub_type", sub_type.as_str()));
    }

    let mut request = client.get(&models_url);
    if !query.is_empty() {
        request = request.query(&query);
    }
    let request = add_auth_headers(request, &credentials.api_key, "application/json");

    debug!(url = %models_url, ?query, "Fetching model list");
    let response = request.send().await.map_err(|err| ApiError::transport(&err))?;
    read_json(response).await
}

/// Newest first; models without a creation time go last. Ties fall back to
/// the id so listings are stable.
pub fn sort_models(models: &mut [ModelInfo]) {
    models.sort_by(|a, b| match (a.created, b.created) {
        (Some(a_created), Some(b_created)) => {
            b_created.cmp(&a_created).then_with(|| a.id.cmp(&b.id))
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.id.cmp(&b.id),
    });
}
