use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

/// Resumable.js request parameters, as sent in the query string or multipart form.
///
/// Values stay raw strings; parsing and validation belong to the session resolver.
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ResumableParams {
    pub resumable_filename: Option<String>,
    pub resumable_total_size: Option<String>,
    pub resumable_chunk_number: Option<String>,
    pub resumable_current_chunk_size: Option<String>,
}
