//! Dataset registration
//!
//! Endpoints used:
//!   GET  <base>/datasets/{name}/
//!   POST <base>/datasets/
//!   POST <base>/datasets/{name}/assign-tables/

use serde_json::{Value, json};
use tracing::info;

use super::ApiError;
use crate::manifest::Manifest;
use crate::models::TableRef;

#[cfg(feature = "api-backend")]
use super::ApiClient;

/// Error type for dataset registration
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("Manifest is missing required field: 'name'")]
    MissingName,

    #[error("{action} for dataset '{dataset}' failed with HTTP {status}: {payload}")]
    Rejected {
        action: &'static str,
        dataset: String,
        status: u16,
        payload: Value,
    },

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Dataset endpoints of the store
pub trait DatasetApi {
    /// Fetch a dataset, `None` when it does not exist
    fn get_dataset(&self, name: &str) -> Result<Option<Value>, DatasetError>;

    fn create_dataset(
        &self,
        name: &str,
        title: &str,
        description: &str,
        at_id: Option<&str>,
    ) -> Result<Value, DatasetError>;

    fn assign_tables(&self, name: &str, tables: &[TableRef]) -> Result<Value, DatasetError>;
}

/// Make sure the manifest's dataset exists and optionally attach its tables.
///
/// Returns the server's copy of the dataset as it stands afterwards.
pub fn ensure_dataset<D: DatasetApi + ?Sized>(
    api: &D,
    manifest: &Manifest,
    default_schema: &str,
    assign_resources: bool,
) -> Result<Value, DatasetError> {
    let name = manifest.dataset_name().ok_or(DatasetError::MissingName)?;
    let title = manifest
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(name);
    let description = match manifest.description.as_deref().map(str::trim) {
        Some(d) if !d.is_empty() => d.to_string(),
        _ => format!("Dataset {}", name),
    };

    let existing = match api.get_dataset(name)? {
        Some(dataset) => dataset,
        None => {
            info!("Creating dataset {}", name);
            api.create_dataset(name, title, &description, manifest.id.as_deref())?
        }
    };

    if assign_resources {
        let tables = manifest.dataset_tables(default_schema);
        if !tables.is_empty() {
            info!("Assigning {} table(s) to dataset {}", tables.len(), name);
            api.assign_tables(name, &tables)?;
        }
    }

    Ok(api.get_dataset(name)?.unwrap_or(existing))
}

fn create_body(name: &str, title: &str, description: &str, at_id: Option<&str>) -> Value {
    let mut body = json!({
        "name": name,
        "title": title,
        "description": description,
    });
    if let Some(at_id) = at_id.filter(|a| !a.trim().is_empty()) {
        body["at_id"] = Value::String(at_id.to_string());
    }
    body
}

fn assign_body(name: &str, tables: &[TableRef]) -> Value {
    let tables: Vec<Value> = tables
        .iter()
        .map(|t| json!({"schema": t.schema, "name": t.name}))
        .collect();
    json!({"dataset_name": name, "tables": tables})
}

/// [`DatasetApi`] over the HTTP client
#[cfg(feature = "api-backend")]
pub struct DatasetService<'a> {
    client: &'a ApiClient,
}

#[cfg(feature = "api-backend")]
impl<'a> DatasetService<'a> {
    pub fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    fn post(
        &self,
        action: &'static str,
        dataset: &str,
        segments: &[&str],
        body: &Value,
        accepted: &[u16],
    ) -> Result<Value, DatasetError> {
        let response = self.client.post_json(segments, body)?;
        if !accepted.contains(&response.status) {
            return Err(DatasetError::Rejected {
                action,
                dataset: dataset.to_string(),
                status: response.status,
                payload: response.payload,
            });
        }
        Ok(response.payload)
    }
}

#[cfg(feature = "api-backend")]
impl DatasetApi for DatasetService<'_> {
    fn get_dataset(&self, name: &str) -> Result<Option<Value>, DatasetError> {
        match self.client.get_json(&["datasets", name, ""]) {
            Ok(dataset) => Ok(Some(dataset)),
            Err(e) if e.status() == Some(404) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn create_dataset(
        &self,
        name: &str,
        title: &str,
        description: &str,
        at_id: Option<&str>,
    ) -> Result<Value, DatasetError> {
        self.post(
            "Create",
            name,
            &["datasets", ""],
            &create_body(name, title, description, at_id),
            &[200, 201],
        )
    }

    fn assign_tables(&self, name: &str, tables: &[TableRef]) -> Result<Value, DatasetError> {
        self.post(
            "Table assignment",
            name,
            &["datasets", name, "assign-tables", ""],
            &assign_body(name, tables),
            &[200, 201, 202],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct FakeDatasets {
        existing: RefCell<Option<Value>>,
        calls: RefCell<Vec<String>>,
        assigned: RefCell<Vec<TableRef>>,
    }

    impl DatasetApi for FakeDatasets {
        fn get_dataset(&self, name: &str) -> Result<Option<Value>, DatasetError> {
            self.calls.borrow_mut().push(format!("get {}", name));
            Ok(self.existing.borrow().clone())
        }

        fn create_dataset(
            &self,
            name: &str,
            title: &str,
            description: &str,
            at_id: Option<&str>,
        ) -> Result<Value, DatasetError> {
            self.calls.borrow_mut().push(format!("create {}", name));
            let created = create_body(name, title, description, at_id);
            *self.existing.borrow_mut() = Some(created.clone());
            Ok(created)
        }

        fn assign_tables(&self, name: &str, tables: &[TableRef]) -> Result<Value, DatasetError> {
            self.calls.borrow_mut().push(format!("assign {}", name));
            self.assigned.borrow_mut().extend_from_slice(tables);
            Ok(json!({"assigned": tables.len()}))
        }
    }

    fn manifest() -> Manifest {
        Manifest::parse(
            r#"{
                "name": "survey",
                "resources": [
                    {"name": "households", "path": "h.csv"},
                    {"name": "persons", "path": "p.csv", "schema": "sandbox"}
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_creates_missing_dataset_with_defaults() {
        let api = FakeDatasets::default();
        let dataset = ensure_dataset(&api, &manifest(), "model_draft", true).unwrap();

        assert_eq!(dataset["title"], "survey");
        assert_eq!(dataset["description"], "Dataset survey");
        assert!(dataset.get("at_id").is_none());
        assert_eq!(
            *api.calls.borrow(),
            vec!["get survey", "create survey", "assign survey", "get survey"]
        );
        assert_eq!(
            *api.assigned.borrow(),
            vec![
                TableRef::new("model_draft", "households"),
                TableRef::new("sandbox", "persons"),
            ]
        );
    }

    #[test]
    fn test_existing_dataset_without_assignment() {
        let api = FakeDatasets::default();
        *api.existing.borrow_mut() = Some(json!({"name": "survey", "uuid": "abc"}));

        let dataset = ensure_dataset(&api, &manifest(), "model_draft", false).unwrap();
        assert_eq!(dataset["uuid"], "abc");
        assert_eq!(*api.calls.borrow(), vec!["get survey", "get survey"]);
    }

    #[test]
    fn test_missing_name_is_error() {
        let api = FakeDatasets::default();
        let manifest = Manifest::parse(r#"{"resources": []}"#).unwrap();
        assert!(matches!(
            ensure_dataset(&api, &manifest, "model_draft", true),
            Err(DatasetError::MissingName)
        ));
        assert!(api.calls.borrow().is_empty());
    }

    #[test]
    fn test_request_bodies() {
        let body = create_body("survey", "Survey", "desc", Some("https://example.org/x"));
        assert_eq!(body["at_id"], "https://example.org/x");

        let body = assign_body("survey", &[TableRef::new("model_draft", "households")]);
        assert_eq!(
            body,
            json!({
                "dataset_name": "survey",
                "tables": [{"schema": "model_draft", "name": "households"}]
            })
        );
    }
}
