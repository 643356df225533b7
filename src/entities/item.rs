use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};

use crate::models::{Item, WriteItemParams};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    #[sea_orm(column_name = "type")]
    pub item_type: Option<String>,
    /// JSON array of strings
    pub tags: Json,
    pub price: Option<i64>,
    pub image_url: Option<String>,
    pub bought_at: DateTimeUtc,
    pub opened_at: Option<DateTimeUtc>,
    pub expires_at: Option<DateTimeUtc>,
    pub lifespan: Option<i64>,
    #[sea_orm(indexed)]
    pub location_id: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::location::Entity",
        from = "Column::LocationId",
        to = "super::location::Column::Id"
    )]
    Location,
}

impl Related<super::location::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Location.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn tag_list(&self) -> Result<Vec<String>, serde_json::Error> {
        serde_json::from_value(self.tags.clone())
    }

    pub fn into_item(self) -> Result<Item, serde_json::Error> {
        let tags = self.tag_list()?;
        Ok(Item {
            id: self.id,
            name: self.name,
            item_type: self.item_type,
            tags,
            price: self.price,
            image_url: self.image_url,
            bought_at: self.bought_at,
            opened_at: self.opened_at,
            expires_at: self.expires_at,
            lifespan: self.lifespan,
            location_id: self.location_id,
            location: None,
        })
    }
}

impl ActiveModel {
    /// Active model with every writable column set from `params`.
    pub fn from_params(id: &str, params: &WriteItemParams) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id: Set(id.to_string()),
            name: Set(params.name.clone()),
            item_type: Set(params.item_type.clone()),
            tags: Set(serde_json::to_value(&params.tags)?),
            price: Set(params.price),
            image_url: Set(params.image_url.clone()),
            bought_at: Set(params.bought_at),
            opened_at: Set(params.opened_at),
            expires_at: Set(params.expires_at),
            lifespan: Set(params.lifespan),
            location_id: Set(params.location_id.clone()),
        })
    }
}
