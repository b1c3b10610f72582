//! Table catalog: legacy → target table mapping and the canonical load order.
//!
//! The [`TableCatalog`] is built once, validated, and shared read-only by the
//! exporter, importer and seeder. Its order is a topological ordering of the
//! target schema's foreign keys: a table always appears after every table it
//! references, so loading tables in catalog order never inserts a child
//! before its parent table has been processed.

mod table_spec;

pub use table_spec::{has_boolean_segment, TableSpec, BOOLEAN_NAME_SEGMENTS};

use std::collections::{BTreeMap, HashMap};

use crate::error::{MigrateError, Result};

/// Immutable registry of table specs in load order.
#[derive(Debug, Clone)]
pub struct TableCatalog {
    /// Specs in load order.
    specs: Vec<TableSpec>,
    /// Target name → position in `specs`.
    by_target: HashMap<String, usize>,
    /// Legacy name → position in `specs`.
    by_legacy: HashMap<String, usize>,
}

impl TableCatalog {
    /// Build a catalog from specs listed in load order.
    ///
    /// Fails if a name is duplicated or a table depends on a table that is
    /// not loaded before it.
    pub fn new(specs: Vec<TableSpec>) -> Result<Self> {
        let mut by_target = HashMap::new();
        let mut by_legacy = HashMap::new();

        for (idx, spec) in specs.iter().enumerate() {
            // Self-references (tree tables) are satisfied by the table itself
            for dep in &spec.depends_on {
                if dep != &spec.target_name && !by_target.contains_key(dep) {
                    return Err(MigrateError::Catalog(format!(
                        "{} depends on {} which is not loaded before it",
                        spec.target_name, dep
                    )));
                }
            }
            if by_target.insert(spec.target_name.clone(), idx).is_some() {
                return Err(MigrateError::Catalog(format!(
                    "target table {} is declared twice",
                    spec.target_name
                )));
            }
            if by_legacy.insert(spec.legacy_name.clone(), idx).is_some() {
                return Err(MigrateError::Catalog(format!(
                    "legacy table {} is declared twice",
                    spec.legacy_name
                )));
            }
        }

        Ok(Self {
            specs,
            by_target,
            by_legacy,
        })
    }

    /// The catalog for the legacy application schema.
    pub fn standard() -> Self {
        Self::new(standard_specs()).expect("standard catalog load order is valid")
    }

    /// Specs in load order.
    pub fn specs(&self) -> &[TableSpec] {
        &self.specs
    }

    /// Target table names in load order.
    pub fn load_order(&self) -> Vec<&str> {
        self.specs.iter().map(|s| s.target_name.as_str()).collect()
    }

    /// Legacy → target name mapping.
    pub fn table_mapping(&self) -> BTreeMap<String, String> {
        self.specs
            .iter()
            .map(|s| (s.legacy_name.clone(), s.target_name.clone()))
            .collect()
    }

    /// Look up a spec by target name.
    pub fn by_target(&self, name: &str) -> Option<&TableSpec> {
        self.by_target.get(name).map(|&idx| &self.specs[idx])
    }

    /// Look up a spec by legacy or target name.
    pub fn resolve(&self, name: &str) -> Option<&TableSpec> {
        self.by_target
            .get(name)
            .or_else(|| self.by_legacy.get(name))
            .map(|&idx| &self.specs[idx])
    }

    /// Position of a table (legacy or target name) in the load order.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.by_target
            .get(name)
            .or_else(|| self.by_legacy.get(name))
            .copied()
    }

    /// Sort table names into load order. Names outside the catalog keep their
    /// relative order and go last.
    pub fn sort_by_load_order(&self, names: &mut [String]) {
        names.sort_by_key(|name| self.position(name).unwrap_or(usize::MAX));
    }

    /// Assert that `parent` is loaded strictly before `child`.
    pub fn assert_loads_before(&self, parent: &str, child: &str) -> Result<()> {
        let p = self
            .position(parent)
            .ok_or_else(|| MigrateError::Catalog(format!("unknown table {}", parent)))?;
        let c = self
            .position(child)
            .ok_or_else(|| MigrateError::Catalog(format!("unknown table {}", child)))?;
        if p < c {
            Ok(())
        } else {
            Err(MigrateError::Catalog(format!(
                "{} must load before {}",
                parent, child
            )))
        }
    }
}

impl Default for TableCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

fn standard_specs() -> Vec<TableSpec> {
    vec![
        TableSpec::new("users", "users")
            .required(&["name", "email"])
            .booleans(&["is_admin"])
            .json(&["preferences"]),
        TableSpec::new("organisations", "organizations")
            .required(&["name"])
            .json(&["social_links", "settings"])
            .numeric(&["latitude", "longitude"])
            .depends_on(&["users"]),
        TableSpec::new("organisation_users", "organization_user")
            .required(&["organization_id", "user_id"])
            .numeric(&["organization_id", "user_id"])
            .depends_on(&["organizations", "users"]),
        TableSpec::new("categories_of_resources", "category_of_resources")
            .required(&["name"])
            .numeric(&["parent_id", "sort_order"])
            .depends_on(&["category_of_resources"]),
        TableSpec::new("resource_types", "resource_types").required(&["name"]),
        TableSpec::new("resources", "resources")
            .required(&["title", "category_id", "resource_type_id"])
            .json(&["metadata", "tags"])
            .numeric(&["category_id", "resource_type_id", "organization_id", "user_id", "downloads"])
            .depends_on(&[
                "users",
                "organizations",
                "category_of_resources",
                "resource_types",
            ]),
        TableSpec::new("events", "events")
            .required(&["title", "start_date"])
            .booleans(&["is_online", "is_featured"])
            .json(&["location_details"])
            .numeric(&["organization_id", "capacity", "price"])
            .depends_on(&["organizations", "users"]),
        TableSpec::new("event_participants", "event_participants")
            .required(&["event_id"])
            .numeric(&["event_id", "user_id", "organization_id"])
            .depends_on(&["events", "organizations", "users"]),
        TableSpec::new("opportunities", "opportunities")
            .required(&["title", "organization_id"])
            .booleans(&["is_remote"])
            .json(&["requirements", "benefits"])
            .numeric(&["organization_id", "salary_min", "salary_max"])
            .depends_on(&["organizations"]),
        TableSpec::new("opportunity_applications", "applications")
            .required(&["opportunity_id", "user_id"])
            .json(&["answers"])
            .numeric(&["opportunity_id", "user_id"])
            .depends_on(&["opportunities", "users"]),
        TableSpec::new("news", "posts")
            .required(&["title"])
            .json(&["tags"])
            .numeric(&["user_id", "organization_id", "views"])
            .depends_on(&["users", "organizations"]),
    ]
}
