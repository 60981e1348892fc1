use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use shared::FieldMetadata;

use crate::api::FieldCatalog;
use crate::error::MapperError;

const NO_DESCRIPTION: &str = "No description available.";

/// Display names for backend fields without a metadata label.
const LABEL_ALIASES: &[(&str, &str)] = &[
    ("origin", "Ethnicity"),
    ("political_lean", "Political Alignment"),
    ("score_vote", "Voting Score"),
    ("nbhood", "Neighborhood"),
    ("preferred_language", "Preferred Language"),
    ("ideal_process", "Ideal Process"),
    ("strategic_profile", "Strategic Profile"),
    ("uniqueid", "Text ID"),
];

/// Lazily loaded field list, legal values and descriptions.
pub struct FieldCatalogCache {
    catalog: Arc<dyn FieldCatalog>,
    fields: Option<BTreeMap<String, String>>,
    values: HashMap<String, Vec<String>>,
}

impl FieldCatalogCache {
    pub fn new(catalog: Arc<dyn FieldCatalog>) -> Self {
        Self {
            catalog,
            fields: None,
            values: HashMap::new(),
        }
    }

    /// Filterable fields and their type names, fetched once.
    pub async fn fields(&mut self) -> Result<&BTreeMap<String, String>, MapperError> {
        if self.fields.is_none() {
            let fields = self.catalog.fields().await?;
            tracing::debug!("catalog lists {} field(s)", fields.len());
            self.fields = Some(fields);
        }
        Ok(self.fields.get_or_insert_with(BTreeMap::new))
    }

    /// Legal values for `field`, fetched at most once. Failures are not cached.
    pub async fn valid_values(&mut self, field: &str) -> Result<&[String], MapperError> {
        if !self.values.contains_key(field) {
            let values = self.catalog.valid_values(field).await?;
            self.values.insert(field.to_string(), values);
        }
        Ok(self.values.get(field).map(Vec::as_slice).unwrap_or_default())
    }

    /// Cached values of `field` containing `typed`, ignoring case.
    pub fn matching_suggestions(&self, field: &str, typed: &str) -> Vec<&str> {
        let needle = typed.to_lowercase();
        self.values
            .get(field)
            .map(|values| {
                values
                    .iter()
                    .filter(|value| value.to_lowercase().contains(&needle))
                    .map(String::as_str)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Metadata for `field`. A failed lookup degrades to a bare entry.
    pub async fn metadata(&self, field: &str, visible_only: bool) -> Vec<FieldMetadata> {
        match self.catalog.field_metadata(field).await {
            Ok(entries) if visible_only => entries
                .into_iter()
                .filter(|entry| entry.visible.unwrap_or(false))
                .collect(),
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!("failed to load metadata for {field:?}: {err}");
                vec![FieldMetadata {
                    field_name: field.to_string(),
                    label: None,
                    description: None,
                    visible: None,
                }]
            }
        }
    }
}

pub fn label_for(field: &str, metadata: Option<&FieldMetadata>) -> String {
    metadata
        .and_then(|m| m.label.as_deref())
        .filter(|label| !label.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format_label(field))
}

pub fn description_for(metadata: Option<&FieldMetadata>) -> &str {
    metadata
        .and_then(|m| m.description.as_deref())
        .filter(|description| !description.trim().is_empty())
        .unwrap_or(NO_DESCRIPTION)
}

/// Alias table first, otherwise `snake_case` → `Snake Case`.
pub fn format_label(field: &str) -> String {
    if let Some((_, alias)) = LABEL_ALIASES.iter().find(|(key, _)| *key == field) {
        return alias.to_string();
    }
    field
        .split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;

    #[derive(Default)]
    struct FakeCatalog {
        value_calls: AtomicUsize,
    }

    #[async_trait]
    impl FieldCatalog for FakeCatalog {
        async fn fields(&self) -> Result<BTreeMap<String, String>, MapperError> {
            Ok([("origin", "str"), ("score_vote", "int")]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect())
        }

        async fn valid_values(&self, _field: &str) -> Result<Vec<String>, MapperError> {
            self.value_calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec!["Haitian".into(), "Italian".into(), "Lebanese".into()])
        }

        async fn field_metadata(&self, field: &str) -> Result<Vec<FieldMetadata>, MapperError> {
            if field == "broken" {
                return Err(MapperError::Config("no metadata".into()));
            }
            Ok(vec![
                FieldMetadata {
                    field_name: field.into(),
                    label: Some("Shown".into()),
                    description: Some("Visible entry".into()),
                    visible: Some(true),
                },
                FieldMetadata {
                    field_name: field.into(),
                    label: Some("Hidden".into()),
                    description: None,
                    visible: Some(false),
                },
            ])
        }
    }

    #[test]
    fn labels_use_alias_then_title_case() {
        assert_eq!(format_label("origin"), "Ethnicity");
        assert_eq!(format_label("political_lean"), "Political Alignment");
        assert_eq!(format_label("favourite_SPORT"), "Favourite Sport");
        assert_eq!(format_label("age"), "Age");
    }

    #[test]
    fn metadata_label_wins_when_present() {
        let meta = FieldMetadata {
            field_name: "origin".into(),
            label: Some("Background".into()),
            description: None,
            visible: Some(true),
        };
        assert_eq!(label_for("origin", Some(&meta)), "Background");
        assert_eq!(label_for("origin", None), "Ethnicity");
        assert_eq!(description_for(Some(&meta)), NO_DESCRIPTION);
    }

    #[tokio::test]
    async fn valid_values_are_fetched_once() {
        let fake = Arc::new(FakeCatalog::default());
        let mut cache = FieldCatalogCache::new(fake.clone());

        assert_eq!(cache.valid_values("origin").await.unwrap().len(), 3);
        assert_eq!(cache.valid_values("origin").await.unwrap().len(), 3);
        assert_eq!(fake.value_calls.load(Ordering::SeqCst), 1);

        assert_eq!(cache.matching_suggestions("origin", "AN"), ["Haitian", "Italian", "Lebanese"]);
        assert_eq!(cache.matching_suggestions("origin", "leb"), ["Lebanese"]);
        assert!(cache.matching_suggestions("nbhood", "x").is_empty());
    }

    #[tokio::test]
    async fn fields_and_visible_metadata() {
        let mut cache = FieldCatalogCache::new(Arc::new(FakeCatalog::default()));
        let fields: Vec<_> = cache.fields().await.unwrap().keys().cloned().collect();
        assert_eq!(fields, ["origin", "score_vote"]);

        let visible = cache.metadata("origin", true).await;
        assert_eq!(visible.len(), 1);
        assert_eq!(label_for("origin", visible.first()), "Shown");

        let all = cache.metadata("origin", false).await;
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn metadata_failure_degrades_to_bare_entry() {
        let cache = FieldCatalogCache::new(Arc::new(FakeCatalog::default()));
        let entries = cache.metadata("broken", true).await;
        assert_eq!(entries.len(), 1);
        assert_eq!(label_for("broken", entries.first()), "Broken");
        assert_eq!(description_for(entries.first()), NO_DESCRIPTION);
    }
}
