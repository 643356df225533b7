use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument};

use super::{new_id, ItemFilter, Repository, RepositoryError};
use crate::models::{Item, Location, WriteItemParams};

/// Clears `locationId` on every item in KEYS[2] that points at ARGV[1], then removes
/// the location from KEYS[1]. Only the matched field text is rewritten.
const DELETE_LOCATION_LUA: &str = r#"
local needle = ARGV[2]
local detached = 0
local entries = redis.call('HGETALL', KEYS[2])
for i = 1, #entries, 2 do
    local json = entries[i + 1]
    local at = string.find(json, needle, 1, true)
    if at then
        local cleared = string.sub(json, 1, at - 1) .. '"locationId":null' .. string.sub(json, at + #needle)
        redis.call('HSET', KEYS[2], entries[i], cleared)
        detached = detached + 1
    end
end
redis.call('HDEL', KEYS[1], ARGV[1])
return detached
"#;

/// The `locationId` member exactly as serde_json writes it into a stored item.
fn location_ref(id: &str) -> Result<String, RepositoryError> {
    Ok(format!("\"locationId\":{}", serde_json::to_string(id)?))
}

/// Redis backend storing each record as JSON inside one hash per collection:
/// `{namespace}:locations` and `{namespace}:items`, keyed by id.
#[derive(Clone)]
pub struct KvRepository {
    conn: ConnectionManager,
    locations_key: String,
    items_key: String,
    delete_location_script: redis::Script,
}

impl KvRepository {
    pub async fn connect(redis_url: &str, namespace: &str) -> Result<Self, RepositoryError> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        info!(namespace, "Connected to redis repository");
        Ok(Self::with_connection(conn, namespace))
    }

    pub fn with_connection(conn: ConnectionManager, namespace: &str) -> Self {
        Self {
            conn,
            locations_key: format!("{}:locations", namespace),
            items_key: format!("{}:items", namespace),
            delete_location_script: redis::Script::new(DELETE_LOCATION_LUA),
        }
    }

    async fn all_values<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>, RepositoryError> {
        let mut conn = self.conn.clone();
        let raw: Vec<String> = conn.hvals(key).await?;
        decode_all(raw)
    }

    async fn values_for<T: DeserializeOwned>(
        &self,
        key: &str,
        ids: &[String],
    ) -> Result<Vec<T>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.clone();
        let raw: Vec<Option<String>> = redis::cmd("HMGET")
            .arg(key)
            .arg(ids)
            .query_async(&mut conn)
            .await?;
        decode_all(raw.into_iter().flatten())
    }

    async fn load_item(&self, id: &str) -> Result<Item, RepositoryError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.hget(&self.items_key, id).await?;
        let raw = raw.ok_or_else(|| RepositoryError::item_not_found(id))?;
        Ok(serde_json::from_str(&raw)?)
    }

    async fn store_item(&self, item: &Item) -> Result<(), RepositoryError> {
        let mut conn = self.conn.clone();
        let json = serde_json::to_string(item)?;
        conn.hset::<_, _, _, ()>(&self.items_key, &item.id, json)
            .await?;
        Ok(())
    }
}

fn decode_all<T, I>(raw: I) -> Result<Vec<T>, RepositoryError>
where
    T: DeserializeOwned,
    I: IntoIterator<Item = String>,
{
    raw.into_iter()
        .map(|json| serde_json::from_str(&json).map_err(RepositoryError::from))
        .collect()
}

#[async_trait]
impl Repository for KvRepository {
    async fn get_locations(
        &self,
        ids: Option<Vec<String>>,
    ) -> Result<Vec<Location>, RepositoryError> {
        match ids {
            None => self.all_values(&self.locations_key).await,
            Some(ids) => self.values_for(&self.locations_key, &ids).await,
        }
    }

    #[instrument(skip(self))]
    async fn create_location(&self, name: &str) -> Result<Location, RepositoryError> {
        let location = Location::new(new_id(), name);
        let mut conn = self.conn.clone();
        conn.hset::<_, _, _, ()>(
            &self.locations_key,
            &location.id,
            serde_json::to_string(&location)?,
        )
        .await?;
        Ok(location)
    }

    #[instrument(skip(self))]
    async fn update_location(&self, id: &str, name: &str) -> Result<Location, RepositoryError> {
        let mut conn = self.conn.clone();
        let exists: bool = conn.hexists(&self.locations_key, id).await?;
        if !exists {
            return Err(RepositoryError::location_not_found(id));
        }

        let location = Location::new(id, name);
        conn.hset::<_, _, _, ()>(&self.locations_key, id, serde_json::to_string(&location)?)
            .await?;
        Ok(location)
    }

    #[instrument(skip(self))]
    async fn delete_location(&self, id: &str) -> Result<(), RepositoryError> {
        let mut conn = self.conn.clone();
        let detached: i64 = self
            .delete_location_script
            .key(&self.locations_key)
            .key(&self.items_key)
            .arg(id)
            .arg(location_ref(id)?)
            .invoke_async(&mut conn)
            .await?;
        debug!(detached, "location deleted");
        Ok(())
    }

    async fn get_items(
        &self,
        tags: Option<Vec<String>>,
        location_ids: Option<Vec<String>>,
    ) -> Result<Vec<Item>, RepositoryError> {
        let filter = ItemFilter::new(tags, location_ids);
        let items: Vec<Item> = self.all_values(&self.items_key).await?;
        Ok(items.into_iter().filter(|i| filter.matches(i)).collect())
    }

    #[instrument(skip(self, params), fields(name = %params.name))]
    async fn create_item(&self, params: &WriteItemParams) -> Result<Item, RepositoryError> {
        let item = Item::from_params(new_id(), params.clone());
        self.store_item(&item).await?;
        Ok(item)
    }

    #[instrument(skip(self, params))]
    async fn update_item(
        &self,
        id: &str,
        params: &WriteItemParams,
    ) -> Result<Item, RepositoryError> {
        let mut item = self.load_item(id).await?;
        item.apply(params.clone());
        self.store_item(&item).await?;
        Ok(item)
    }

    #[instrument(skip(self))]
    async fn update_item_location(
        &self,
        id: &str,
        location_id: Option<String>,
    ) -> Result<Item, RepositoryError> {
        let mut item = self.load_item(id).await?;
        item.location_id = location_id;
        self.store_item(&item).await?;
        Ok(item)
    }

    #[instrument(skip(self))]
    async fn delete_item(&self, id: &str) -> Result<(), RepositoryError> {
        let mut conn = self.conn.clone();
        conn.hdel::<_, _, ()>(&self.items_key, id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::item::fixtures::item;

    // Mirrors the splice DELETE_LOCATION_LUA performs on each stored record.
    fn clear_location(json: &str, id: &str) -> Option<String> {
        let needle = location_ref(id).unwrap();
        let at = json.find(&needle)?;
        Some(format!(
            "{}\"locationId\":null{}",
            &json[..at],
            &json[at + needle.len()..]
        ))
    }

    #[test]
    fn location_ref_matches_stored_json() {
        let mut stored = item("milk", "Oat milk", Some("fridge-1"));
        stored.tags = vec![];
        stored.price = Some(250);
        let json = serde_json::to_string(&stored).unwrap();

        let cleared = clear_location(&json, "fridge-1").expect("reference present");
        let decoded: Item = serde_json::from_str(&cleared).unwrap();
        assert_eq!(decoded.location_id, None);
        assert_eq!(decoded.name, "Oat milk");
        assert_eq!(decoded.price, Some(250));
        assert!(decoded.tags.is_empty());
    }

    #[test]
    fn other_locations_are_left_alone() {
        let json = serde_json::to_string(&item("jam", "Jam", Some("shelf"))).unwrap();
        assert_eq!(clear_location(&json, "shelf-2"), None);
        assert_eq!(clear_location(&json, "she"), None);

        let unassigned = serde_json::to_string(&item("salt", "Salt", None)).unwrap();
        assert_eq!(clear_location(&unassigned, "shelf"), None);
    }
}
