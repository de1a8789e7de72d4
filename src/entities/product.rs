use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{FromJsonQueryResult, Set};
use serde::{Deserialize, Serialize};

/// Target audience of a product.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum Gender {
    #[sea_orm(string_value = "Hombre")]
    #[serde(rename = "Hombre")]
    #[strum(serialize = "Hombre")]
    Men,
    #[sea_orm(string_value = "Mujer")]
    #[serde(rename = "Mujer")]
    #[strum(serialize = "Mujer")]
    Women,
    #[sea_orm(string_value = "Niños")]
    #[serde(rename = "Niños")]
    #[strum(serialize = "Niños")]
    Kids,
    #[sea_orm(string_value = "Unisex")]
    Unisex,
}

/// A size is either numeric (shoe sizes) or textual ("M", "XL").
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SizeValue {
    Number(serde_json::Number),
    Text(String),
}

impl SizeValue {
    fn key(&self) -> String {
        match self {
            SizeValue::Number(n) => n.to_string(),
            SizeValue::Text(s) => s.trim().to_uppercase(),
        }
    }
}

/// Option sets offered for a product. Both behave as sets.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct ProductOptions {
    #[serde(default, alias = "color")]
    pub colors: Vec<String>,
    #[serde(default, alias = "talla")]
    pub sizes: Vec<SizeValue>,
}

impl ProductOptions {
    /// Drops blank and duplicate entries, keeping first occurrences in order.
    pub fn normalized(self) -> Self {
        let mut seen = std::collections::HashSet::new();
        let colors = self
            .colors
            .into_iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty() && seen.insert(c.to_lowercase()))
            .collect();

        let mut seen = std::collections::HashSet::new();
        let sizes = self
            .sizes
            .into_iter()
            .filter(|s| {
                let key = s.key();
                !key.is_empty() && seen.insert(key)
            })
            .collect();

        Self { colors, sizes }
    }
}

/// Ordered list of image URLs.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
#[serde(transparent)]
pub struct ImageList(pub Vec<String>);

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub price: Decimal,
    pub stock: i32,
    pub brand: Option<String>,
    pub gender: Option<Gender>,
    pub category_id: Uuid,
    pub options: ProductOptions,
    pub images: ImageList,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::category::Entity",
        from = "Column::CategoryId",
        to = "super::category::Column::Id",
        on_delete = "Restrict"
    )]
    Category,
    #[sea_orm(has_many = "super::sale_item::Entity")]
    SaleItems,
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl Related<super::sale_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SaleItems.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(mut self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        if !insert {
            self.updated_at = Set(Utc::now());
        }
        Ok(self)
    }
}
