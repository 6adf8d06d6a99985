use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    domain::value_objects::enums::product_types::ProductType,
    infra::db::postgres::schema::products,
};

#[derive(Debug, Clone, PartialEq)]
pub struct ProductEntity {
    pub id: Uuid,
    pub name: String,
    pub product_type: ProductType,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = products)]
pub struct ProductRow {
    pub id: Uuid,
    pub name: String,
    pub product_type: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for ProductEntity {
    type Error = anyhow::Error;

    fn try_from(row: ProductRow) -> Result<Self> {
        let product_type = ProductType::from_str(&row.product_type).ok_or_else(|| {
            anyhow!(
                "product {} has unknown type '{}'",
                row.id,
                row.product_type
            )
        })?;

        Ok(Self {
            id: row.id,
            name: row.name,
            product_type,
            created_at: row.created_at,
        })
    }
}
