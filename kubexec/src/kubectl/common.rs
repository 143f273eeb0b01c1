use serde::Deserialize;

/// The envelope of `kubectl get <kind> --output=json` when listing.
#[derive(Debug, Deserialize)]
pub struct GetResource<T> {
    #[serde(rename = "items")]
    pub items: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
/// https://github.com/kubernetes/community/blob/master/contributors/devel/sig-architecture/api-conventions.md#metadata
pub struct ResourceMetadata {
    pub name: String,

    #[serde(default, with = "time::serde::rfc3339::option")]
    pub creation_timestamp: Option<time::OffsetDateTime>,
}
