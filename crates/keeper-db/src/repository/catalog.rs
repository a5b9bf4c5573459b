//! # Catalog Repository
//!
//! Reference data the asset lifecycle reads but never changes: companies,
//! locations, suppliers, manufacturers, categories, status labels, fieldsets
//! with their custom fields, asset models and users.
//!
//! ## Model Loading
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  get_model(id)                                                          │
//! │       │                                                                 │
//! │       ├── asset_models row                                              │
//! │       │       │ fieldset_id?                                            │
//! │       │       ▼                                                         │
//! │       ├── fieldsets row                                                 │
//! │       └── fieldset_fields ⋈ custom_fields (ordered by sort_order)       │
//! │                                                                         │
//! │  Result: AssetModel { fieldset: Some(Fieldset { fields: [...] }) }      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use keeper_core::validation::validate_custom_column;
use keeper_core::{
    AssetModel, CheckoutTarget, CustomFieldDef, Fieldset, Location, ParentAsset, StatusLabel,
    TargetKind, TargetRef, User,
};

/// Tables holding plain `(id, name)` reference rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedTable {
    Companies,
    Suppliers,
    Manufacturers,
    Categories,
}

impl NamedTable {
    fn table(self) -> &'static str {
        match self {
            NamedTable::Companies => "companies",
            NamedTable::Suppliers => "suppliers",
            NamedTable::Manufacturers => "manufacturers",
            NamedTable::Categories => "categories",
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ModelRow {
    id: String,
    name: String,
    model_number: Option<String>,
    category_id: Option<String>,
    manufacturer_id: Option<String>,
    fieldset_id: Option<String>,
    checkin_email: bool,
}

#[derive(Debug, sqlx::FromRow)]
struct CustomFieldRow {
    id: String,
    name: String,
    column_name: String,
    required: bool,
}

impl From<CustomFieldRow> for CustomFieldDef {
    fn from(row: CustomFieldRow) -> Self {
        CustomFieldDef {
            id: row.id,
            name: row.name,
            column: row.column_name,
            required: row.required,
        }
    }
}

/// Repository for reference data.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    // =========================================================================
    // Inserts
    // =========================================================================

    /// Inserts a plain `(id, name)` row.
    pub async fn insert_named(&self, table: NamedTable, id: &str, name: &str) -> DbResult<()> {
        debug!(table = table.table(), id = %id, name = %name, "Inserting reference row");

        let query = format!("INSERT INTO {} (id, name) VALUES (?, ?)", table.table());
        sqlx::query(&query)
            .bind(id)
            .bind(name)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn insert_location(&self, location: &Location) -> DbResult<()> {
        debug!(id = %location.id, "Inserting location");

        sqlx::query("INSERT INTO locations (id, name) VALUES (?, ?)")
            .bind(&location.id)
            .bind(&location.name)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn insert_status_label(&self, label: &StatusLabel) -> DbResult<()> {
        debug!(id = %label.id, name = %label.name, "Inserting status label");

        sqlx::query(
            "INSERT INTO status_labels (id, name, deployable, pending, archived) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&label.id)
        .bind(&label.name)
        .bind(label.deployable)
        .bind(label.pending)
        .bind(label.archived)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Inserts a fieldset and its fields in one transaction.
    ///
    /// Fields already known by id are linked, not duplicated. Column keys are
    /// validated before anything is written.
    pub async fn insert_fieldset(&self, fieldset: &Fieldset) -> DbResult<()> {
        debug!(id = %fieldset.id, fields = fieldset.fields.len(), "Inserting fieldset");

        for field in &fieldset.fields {
            validate_custom_column(&field.column)?;
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO fieldsets (id, name) VALUES (?, ?)")
            .bind(&fieldset.id)
            .bind(&fieldset.name)
            .execute(&mut *tx)
            .await?;

        for (position, field) in fieldset.fields.iter().enumerate() {
            sqlx::query(
                "INSERT INTO custom_fields (id, name, column_name) VALUES (?, ?, ?) \
                 ON CONFLICT(id) DO NOTHING",
            )
            .bind(&field.id)
            .bind(&field.name)
            .bind(&field.column)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                "INSERT INTO fieldset_fields (fieldset_id, custom_field_id, required, sort_order) \
                 VALUES (?, ?, ?, ?)",
            )
            .bind(&fieldset.id)
            .bind(&field.id)
            .bind(field.required)
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Inserts an asset model. Its fieldset, if any, must already exist.
    pub async fn insert_model(&self, model: &AssetModel) -> DbResult<()> {
        debug!(id = %model.id, name = %model.name, "Inserting asset model");

        sqlx::query(
            "INSERT INTO asset_models \
                (id, name, model_number, category_id, manufacturer_id, fieldset_id, checkin_email) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&model.id)
        .bind(&model.name)
        .bind(&model.model_number)
        .bind(&model.category_id)
        .bind(&model.manufacturer_id)
        .bind(model.fieldset.as_ref().map(|f| f.id.as_str()))
        .bind(model.checkin_email)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn insert_user(&self, user: &User) -> DbResult<()> {
        debug!(id = %user.id, "Inserting user");

        sqlx::query(
            "INSERT INTO users (id, first_name, last_name, email, company_id, location_id) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(&user.company_id)
        .bind(&user.location_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// Loads a model together with its fieldset and ordered fields.
    pub async fn get_model(&self, id: &str) -> DbResult<Option<AssetModel>> {
        let row = sqlx::query_as::<_, ModelRow>(
            "SELECT id, name, model_number, category_id, manufacturer_id, fieldset_id, checkin_email \
             FROM asset_models WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let fieldset = match &row.fieldset_id {
            Some(fieldset_id) => self.get_fieldset(fieldset_id).await?,
            None => None,
        };

        Ok(Some(AssetModel {
            id: row.id,
            name: row.name,
            model_number: row.model_number,
            category_id: row.category_id,
            manufacturer_id: row.manufacturer_id,
            checkin_email: row.checkin_email,
            fieldset,
        }))
    }

    /// Loads a fieldset with its fields in display order.
    pub async fn get_fieldset(&self, id: &str) -> DbResult<Option<Fieldset>> {
        let header: Option<(String, String)> =
            sqlx::query_as("SELECT id, name FROM fieldsets WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        let Some((id, name)) = header else {
            return Ok(None);
        };

        let fields = sqlx::query_as::<_, CustomFieldRow>(
            "SELECT cf.id, cf.name, cf.column_name, ff.required \
             FROM fieldset_fields ff \
             INNER JOIN custom_fields cf ON cf.id = ff.custom_field_id \
             WHERE ff.fieldset_id = ? \
             ORDER BY ff.sort_order",
        )
        .bind(&id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(Fieldset {
            id,
            name,
            fields: fields.into_iter().map(CustomFieldDef::from).collect(),
        }))
    }

    pub async fn get_user(&self, id: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, first_name, last_name, email, company_id, location_id \
             FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn get_location(&self, id: &str) -> DbResult<Option<Location>> {
        let location = sqlx::query_as::<_, Location>("SELECT id, name FROM locations WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(location)
    }

    pub async fn get_status_label(&self, id: &str) -> DbResult<Option<StatusLabel>> {
        let label = sqlx::query_as::<_, StatusLabel>(
            "SELECT id, name, deployable, pending, archived FROM status_labels WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(label)
    }

    /// Every registered custom field column, for the list allow-lists.
    pub async fn custom_columns(&self) -> DbResult<Vec<String>> {
        let columns: Vec<String> =
            sqlx::query_scalar("SELECT column_name FROM custom_fields ORDER BY column_name")
                .fetch_all(&self.pool)
                .await?;

        Ok(columns)
    }

    /// Loads a checkout target. Deleted assets cannot be targets.
    pub async fn find_target(&self, target: &TargetRef) -> DbResult<Option<CheckoutTarget>> {
        let found = match target.kind {
            TargetKind::User => self.get_user(&target.id).await?.map(CheckoutTarget::User),
            TargetKind::Location => self
                .get_location(&target.id)
                .await?
                .map(CheckoutTarget::Location),
            TargetKind::Asset => {
                let parent: Option<(String, String, Option<String>)> = sqlx::query_as(
                    "SELECT id, asset_tag, location_id FROM assets \
                     WHERE id = ? AND deleted_at IS NULL",
                )
                .bind(&target.id)
                .fetch_optional(&self.pool)
                .await?;

                parent.map(|(id, asset_tag, location_id)| {
                    CheckoutTarget::Asset(ParentAsset {
                        id,
                        asset_tag,
                        location_id,
                    })
                })
            }
        };

        if found.is_none() {
            debug!(kind = %target.kind, id = %target.id, "Checkout target not found");
        }
        Ok(found)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig, DbError};

    fn laptop_fieldset() -> Fieldset {
        Fieldset {
            id: "fs-1".to_string(),
            name: "Laptops".to_string(),
            fields: vec![
                CustomFieldDef {
                    id: "cf-mac".to_string(),
                    name: "MAC Address".to_string(),
                    column: "_cf_mac_address".to_string(),
                    required: true,
                },
                CustomFieldDef {
                    id: "cf-ram".to_string(),
                    name: "RAM".to_string(),
                    column: "_cf_ram".to_string(),
                    required: false,
                },
            ],
        }
    }

    #[tokio::test]
    async fn test_model_loads_with_ordered_fieldset() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let catalog = db.catalog();

        catalog.insert_fieldset(&laptop_fieldset()).await.unwrap();
        let model = AssetModel {
            id: "model-1".to_string(),
            name: "ThinkPad".to_string(),
            model_number: None,
            category_id: None,
            manufacturer_id: None,
            checkin_email: true,
            fieldset: Some(laptop_fieldset()),
        };
        catalog.insert_model(&model).await.unwrap();

        let loaded = catalog.get_model("model-1").await.unwrap().unwrap();
        assert_eq!(loaded, model);
        assert_eq!(
            catalog.custom_columns().await.unwrap(),
            vec!["_cf_mac_address".to_string(), "_cf_ram".to_string()]
        );
        assert!(catalog.get_model("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalid_column_is_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut fieldset = laptop_fieldset();
        fieldset.fields[0].column = "Bad Column".to_string();

        let err = db.catalog().insert_fieldset(&fieldset).await.unwrap_err();
        assert!(matches!(err, DbError::Invalid(_)));
        assert!(db.catalog().get_fieldset("fs-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_target() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let catalog = db.catalog();
        catalog
            .insert_location(&Location {
                id: "loc-1".to_string(),
                name: "HQ".to_string(),
            })
            .await
            .unwrap();
        catalog
            .insert_user(&User {
                id: "user-1".to_string(),
                first_name: "Ada".to_string(),
                last_name: "Lovelace".to_string(),
                email: Some("ada@example.com".to_string()),
                company_id: None,
                location_id: Some("loc-1".to_string()),
            })
            .await
            .unwrap();

        let user = catalog
            .find_target(&TargetRef {
                kind: TargetKind::User,
                id: "user-1".to_string(),
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.implied_location_id(), Some("loc-1"));

        let missing = catalog
            .find_target(&TargetRef {
                kind: TargetKind::Asset,
                id: "nope".to_string(),
            })
            .await
            .unwrap();
        assert!(missing.is_none());
    }
}
