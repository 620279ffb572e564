//! # URI Minting
//!
//! Rules for validating and minting record, property, schema and provenance
//! URIs. These must match byte-for-byte what earlier writers produced, or
//! lookups against existing stored data will miss.
//!
//! Missing identifiers or bases never fail: a fresh random UUID is used.

use url::Url;
use uuid::Uuid;

/// Whether `s` parses as an absolute URI with a non-empty scheme.
#[must_use]
pub fn is_valid_uri(s: &str) -> bool {
    Url::parse(s).is_ok_and(|url| !url.scheme().is_empty())
}

/// Mint a property URI from a namespace and a local name.
///
/// A base ending in `/` is extended directly (`http://x/` + `name` →
/// `http://x/name`); any other base is joined with `#` (`http://x` + `name`
/// → `http://x#name`). There are no other cases, so `http://x#` + `name`
/// gives `http://x##name`.
#[must_use]
pub fn mint_property_uri(base: &str, local_name: &str) -> String {
    if base.ends_with('/') {
        return format!("{}{}", base, local_name);
    }
    format!("{}#{}", base, local_name)
}

/// Mint a record URI.
///
/// `<base>/datamodels/<dataModelId>/records/<id>` when a data model is known,
/// `<base>/records/<id>` otherwise. An absent or empty identifier is replaced
/// by a random UUID.
#[must_use]
pub fn mint_record_uri(base: &str, identifier: Option<&str>, data_model_id: Option<&str>) -> String {
    let id = match identifier {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => fresh_id(),
    };

    match data_model_id {
        Some(dm) => format!("{}datamodels/{}/records/{}", with_slash(base), dm, id),
        None => format!("{}records/{}", with_slash(base), id),
    }
}

/// Namespace for properties minted from plain literal names.
///
/// `<base>/datamodels/<dataModelId>/schema`; without a data model the id is a
/// random UUID, so unrelated runs never share a namespace by accident.
#[must_use]
pub fn schema_base_uri(base: &str, data_model_id: Option<&str>) -> String {
    let dm = match data_model_id {
        Some(dm) if !dm.is_empty() => dm.to_string(),
        _ => fresh_id(),
    };
    format!("{}datamodels/{}/schema", with_slash(base), dm)
}

/// URI of the graph owning one resource/configuration's records.
///
/// `<base>/resource/<resourceId>/configurations/<configurationId>/data`
#[must_use]
pub fn provenance_uri(base: &str, resource_id: &str, configuration_id: &str) -> String {
    format!(
        "{}resource/{}/configurations/{}/data",
        with_slash(base),
        resource_id,
        configuration_id
    )
}

fn with_slash(base: &str) -> String {
    if base.ends_with('/') {
        base.to_string()
    } else {
        format!("{}/", base)
    }
}

fn fresh_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// TESTS
// =============================================================================
