use crate::{
    domain::{CommentRepository, LikeRepository, PhotoRepository, PostRepository},
    errors::RepoError,
    models::{newest_first, Comment, Like, Photo, Post, PostCounter},
};
use anyhow::Context;
use async_trait::async_trait;
use aws_sdk_dynamodb::{
    error::SdkError,
    types::{AttributeValue, ReturnValue},
    Client as DynamoDbClient,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::{self, info};
use uuid::Uuid;

type Item = HashMap<String, AttributeValue>;

// --- Shared DynamoDB plumbing ---

/// Table handle shared by the four repositories.
#[derive(Debug, Clone)]
struct Table {
    client: DynamoDbClient,
    name: String,
    key: &'static str,
}

impl Table {
    fn new(client: DynamoDbClient, name: String, key: &'static str) -> Self {
        info!(table_name = %name, "Initializing DynamoDB repository");
        Self { client, name, key }
    }

    async fn put(&self, item: Item, id: Uuid) -> Result<(), RepoError> {
        self.client
            .put_item()
            .table_name(&self.name)
            .set_item(Some(item))
            .send()
            .await
            .context(format!("DynamoDB (table: {}): Failed to put item (id: {})", self.name, id))
            .map_err(RepoError::BackendError)?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Item>, RepoError> {
        let resp = self
            .client
            .get_item()
            .table_name(&self.name)
            .key(self.key, AttributeValue::S(id.to_string()))
            .send()
            .await
            .context(format!("DynamoDB (table: {}): Failed to get item (id: {})", self.name, id))
            .map_err(RepoError::BackendError)?;
        Ok(resp.item)
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
        tracing::debug!(id = %id, table_name = %self.name, "DynamoDB: Deleting item");
        // DeleteItem succeeds even if the item is absent
        self.client
            .delete_item()
            .table_name(&self.name)
            .key(self.key, AttributeValue::S(id.to_string()))
            .send()
            .await
            .context(format!("DynamoDB (table: {}): Failed to delete item (id: {})", self.name, id))
            .map_err(RepoError::BackendError)?;
        Ok(())
    }

    /// Deletes the item only when its `user_id` matches, returning the old item.
    async fn delete_owned(&self, id: Uuid, user_id: &str) -> Result<Option<Item>, RepoError> {
        let result = self
            .client
            .delete_item()
            .table_name(&self.name)
            .key(self.key, AttributeValue::S(id.to_string()))
            .condition_expression("user_id = :uid")
            .expression_attribute_values(":uid", AttributeValue::S(user_id.to_string()))
            .return_values(ReturnValue::AllOld)
            .send()
            .await;

        match result {
            Ok(output) => Ok(output.attributes),
            Err(SdkError::ServiceError(service_err))
                if service_err.err().is_conditional_check_failed_exception() =>
            {
                tracing::debug!(id = %id, table_name = %self.name, "DynamoDB: No owned item to delete");
                Ok(None)
            }
            Err(e) => Err(RepoError::BackendError(anyhow::Error::new(e).context(format!(
                "DynamoDB (table: {}): Failed to delete owned item (id: {})",
                self.name, id
            )))),
        }
    }

    /// Paginated Scan with a filter of `attr = :value` terms joined by AND.
    async fn scan_where(&self, filters: &[(&str, &str)]) -> Result<Vec<Item>, RepoError> {
        let mut expression = Vec::with_capacity(filters.len());
        let mut values = HashMap::with_capacity(filters.len());
        for (index, (attribute, value)) in filters.iter().enumerate() {
            let placeholder = format!(":v{}", index);
            expression.push(format!("{} = {}", attribute, placeholder));
            values.insert(placeholder, AttributeValue::S(value.to_string()));
        }
        let expression = expression.join(" AND ");

        tracing::debug!(table_name = %self.name, filter = %expression, "DynamoDB: Scanning table");
        let mut items: Vec<Item> = Vec::new();
        let mut last_evaluated_key: Option<Item> = None;

        loop {
            let mut request_builder = self
                .client
                .scan()
                .table_name(&self.name)
                .filter_expression(&expression)
                .set_expression_attribute_values(Some(values.clone()));

            // Apply ExclusiveStartKey if paginating from previous response
            if let Some(lek) = last_evaluated_key {
                request_builder = request_builder.set_exclusive_start_key(Some(lek));
            }

            let resp = request_builder
                .send()
                .await
                .context(format!("DynamoDB: Failed to scan table '{}'", self.name))
                .map_err(RepoError::BackendError)?;

            if let Some(page) = resp.items {
                items.extend(page);
            }

            last_evaluated_key = resp.last_evaluated_key;
            if last_evaluated_key.is_none() {
                break;
            }
        }

        tracing::debug!(table_name = %self.name, count = items.len(), "DynamoDB: Scan complete");
        Ok(items)
    }

    fn corrupt(&self, item: &Item) -> RepoError {
        let item_id = item.get(self.key).and_then(|v| v.as_s().ok());
        tracing::error!(item.id = ?item_id, table_name = %self.name, "DynamoDB: Failed to parse item");
        RepoError::DataCorruption(format!(
            "Failed to parse item {:?} from DynamoDB table '{}'",
            item_id, self.name
        ))
    }

    fn parse<T>(&self, item: Item, parse: fn(&Item) -> Option<T>) -> Result<T, RepoError> {
        parse(&item).ok_or_else(|| self.corrupt(&item))
    }

    fn parse_all<T>(&self, items: Vec<Item>, parse: fn(&Item) -> Option<T>) -> Result<Vec<T>, RepoError> {
        items.into_iter().map(|item| self.parse(item, parse)).collect()
    }
}

fn s(value: &str) -> AttributeValue {
    AttributeValue::S(value.to_string())
}

fn n(value: u64) -> AttributeValue {
    AttributeValue::N(value.to_string())
}

/// Counter updates touch only the counter attribute.
const COUNTER_UPDATE: &str = "ADD #counter :delta";

fn ts(value: DateTime<Utc>) -> AttributeValue {
    AttributeValue::S(value.to_rfc3339())
}

fn get_s(item: &Item, key: &str) -> Option<String> {
    item.get(key)?.as_s().ok().cloned()
}

fn get_n(item: &Item, key: &str) -> Option<u64> {
    item.get(key)?.as_n().ok()?.parse().ok()
}

fn get_uuid(item: &Item, key: &str) -> Option<Uuid> {
    Uuid::parse_str(item.get(key)?.as_s().ok()?).ok()
}

fn get_ts(item: &Item, key: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(item.get(key)?.as_s().ok()?)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

// --- Item conversions ---

fn photo_to_item(photo: &Photo) -> Item {
    HashMap::from([
        ("photo_id".to_string(), s(&photo.photo_id.to_string())),
        ("user_id".to_string(), s(&photo.user_id)),
        ("filename".to_string(), s(&photo.filename)),
        ("mimetype".to_string(), s(&photo.mimetype)),
        ("size".to_string(), n(photo.size)),
        ("caption".to_string(), s(&photo.caption)),
        ("location".to_string(), s(&photo.location)),
        ("image_key".to_string(), s(&photo.image_key)),
        ("created_at".to_string(), ts(photo.created_at)),
        ("updated_at".to_string(), ts(photo.updated_at)),
    ])
}

fn item_to_photo(item: &Item) -> Option<Photo> {
    Some(Photo {
        photo_id: get_uuid(item, "photo_id")?,
        user_id: get_s(item, "user_id")?,
        filename: get_s(item, "filename")?,
        mimetype: get_s(item, "mimetype")?,
        size: get_n(item, "size")?,
        caption: get_s(item, "caption").unwrap_or_default(),
        location: get_s(item, "location").unwrap_or_default(),
        image_key: get_s(item, "image_key")?,
        created_at: get_ts(item, "created_at")?,
        updated_at: get_ts(item, "updated_at")?,
    })
}

fn post_to_item(post: &Post) -> Item {
    HashMap::from([
        ("post_id".to_string(), s(&post.post_id.to_string())),
        ("user_id".to_string(), s(&post.user_id)),
        ("photo_id".to_string(), s(&post.photo_id)),
        ("photo_url".to_string(), s(&post.photo_url)),
        ("caption".to_string(), s(&post.caption)),
        ("location".to_string(), s(&post.location)),
        ("likes".to_string(), n(post.likes)),
        ("shares".to_string(), n(post.shares)),
        ("comments".to_string(), n(post.comments)),
        ("created_at".to_string(), ts(post.created_at)),
        ("updated_at".to_string(), ts(post.updated_at)),
    ])
}

fn item_to_post(item: &Item) -> Option<Post> {
    Some(Post {
        post_id: get_uuid(item, "post_id")?,
        user_id: get_s(item, "user_id")?,
        photo_id: get_s(item, "photo_id")?,
        photo_url: get_s(item, "photo_url")?,
        caption: get_s(item, "caption").unwrap_or_default(),
        location: get_s(item, "location").unwrap_or_default(),
        likes: get_n(item, "likes").unwrap_or(0),
        shares: get_n(item, "shares").unwrap_or(0),
        comments: get_n(item, "comments").unwrap_or(0),
        created_at: get_ts(item, "created_at")?,
        updated_at: get_ts(item, "updated_at")?,
    })
}

fn comment_to_item(comment: &Comment) -> Item {
    HashMap::from([
        ("comment_id".to_string(), s(&comment.comment_id.to_string())),
        ("post_id".to_string(), s(&comment.post_id)),
        ("user_id".to_string(), s(&comment.user_id)),
        ("username".to_string(), s(&comment.username)),
        ("text".to_string(), s(&comment.text)),
        ("created_at".to_string(), ts(comment.created_at)),
        ("updated_at".to_string(), ts(comment.updated_at)),
    ])
}

fn item_to_comment(item: &Item) -> Option<Comment> {
    Some(Comment {
        comment_id: get_uuid(item, "comment_id")?,
        post_id: get_s(item, "post_id")?,
        user_id: get_s(item, "user_id")?,
        username: get_s(item, "username")?,
        text: get_s(item, "text")?,
        created_at: get_ts(item, "created_at")?,
        updated_at: get_ts(item, "updated_at")?,
    })
}

fn like_to_item(like: &Like) -> Item {
    HashMap::from([
        ("like_id".to_string(), s(&like.like_id.to_string())),
        ("post_id".to_string(), s(&like.post_id)),
        ("user_id".to_string(), s(&like.user_id)),
        ("created_at".to_string(), ts(like.created_at)),
    ])
}

fn item_to_like(item: &Item) -> Option<Like> {
    Some(Like {
        like_id: get_uuid(item, "like_id")?,
        post_id: get_s(item, "post_id")?,
        user_id: get_s(item, "user_id")?,
        created_at: get_ts(item, "created_at")?,
    })
}

// --- Repositories ---

#[derive(Debug, Clone)]
pub struct DynamoDbPhotoRepository {
    table: Table,
}

impl DynamoDbPhotoRepository {
    pub fn new(client: DynamoDbClient, table_name: String) -> Self {
        Self { table: Table::new(client, table_name, "photo_id") }
    }
}

#[async_trait]
impl PhotoRepository for DynamoDbPhotoRepository {
    async fn insert(&self, photo: &Photo) -> Result<(), RepoError> {
        self.table.put(photo_to_item(photo), photo.photo_id).await
    }

    async fn get(&self, photo_id: Uuid) -> Result<Option<Photo>, RepoError> {
        match self.table.get(photo_id).await? {
            Some(item) => self.table.parse(item, item_to_photo).map(Some),
            None => Ok(None),
        }
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Photo>, RepoError> {
        let items = self.table.scan_where(&[("user_id", user_id)]).await?;
        let mut photos = self.table.parse_all(items, item_to_photo)?;
        newest_first(&mut photos, |p| (p.created_at, p.photo_id));
        Ok(photos)
    }

    async fn delete_owned(&self, photo_id: Uuid, user_id: &str) -> Result<Option<Photo>, RepoError> {
        match self.table.delete_owned(photo_id, user_id).await? {
            Some(item) => self.table.parse(item, item_to_photo).map(Some),
            None => Ok(None),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DynamoDbPostRepository {
    table: Table,
}

impl DynamoDbPostRepository {
    pub fn new(client: DynamoDbClient, table_name: String) -> Self {
        Self { table: Table::new(client, table_name, "post_id") }
    }
}

#[async_trait]
impl PostRepository for DynamoDbPostRepository {
    async fn insert(&self, post: &Post) -> Result<(), RepoError> {
        self.table.put(post_to_item(post), post.post_id).await
    }

    async fn get(&self, post_id: Uuid) -> Result<Option<Post>, RepoError> {
        match self.table.get(post_id).await? {
            Some(item) => self.table.parse(item, item_to_post).map(Some),
            None => Ok(None),
        }
    }

    async fn find_by_photo(&self, photo_id: Uuid) -> Result<Option<Post>, RepoError> {
        let photo_id = photo_id.to_string();
        let items = self.table.scan_where(&[("photo_id", &photo_id)]).await?;
        match items.into_iter().next() {
            Some(item) => self.table.parse(item, item_to_post).map(Some),
            None => Ok(None),
        }
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Post>, RepoError> {
        let items = self.table.scan_where(&[("user_id", user_id)]).await?;
        let mut posts = self.table.parse_all(items, item_to_post)?;
        newest_first(&mut posts, |p| (p.created_at, p.post_id));
        Ok(posts)
    }

    async fn delete_owned(&self, post_id: Uuid, user_id: &str) -> Result<Option<Post>, RepoError> {
        match self.table.delete_owned(post_id, user_id).await? {
            Some(item) => self.table.parse(item, item_to_post).map(Some),
            None => Ok(None),
        }
    }

    /// UpdateItem `ADD` on the counter alone, guarded so it neither upserts a missing post nor
    /// drops the counter below zero.
    async fn adjust_counter(&self, post_id: Uuid, counter: PostCounter, delta: i64) -> Result<bool, RepoError> {
        let minimum = if delta < 0 { delta.unsigned_abs() } else { 0 };
        let result = self
            .table
            .client
            .update_item()
            .table_name(&self.table.name)
            .key("post_id", AttributeValue::S(post_id.to_string()))
            .update_expression(COUNTER_UPDATE)
            .condition_expression("attribute_exists(post_id) AND #counter >= :min")
            .expression_attribute_names("#counter", counter.attribute())
            .expression_attribute_values(":delta", AttributeValue::N(delta.to_string()))
            .expression_attribute_values(":min", n(minimum))
            .send()
            .await;

        match result {
            Ok(_) => {
                tracing::debug!(post_id = %post_id, counter = counter.attribute(), delta, "DynamoDB: Counter adjusted");
                Ok(true)
            }
            Err(SdkError::ServiceError(service_err))
                if service_err.err().is_conditional_check_failed_exception() =>
            {
                tracing::warn!(post_id = %post_id, counter = counter.attribute(), delta, "DynamoDB: Counter adjustment skipped");
                Ok(false)
            }
            Err(e) => Err(RepoError::BackendError(anyhow::Error::new(e).context(format!(
                "DynamoDB (table: {}): Failed to adjust {} on post {}",
                self.table.name,
                counter.attribute(),
                post_id
            )))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DynamoDbCommentRepository {
    table: Table,
}

impl DynamoDbCommentRepository {
    pub fn new(client: DynamoDbClient, table_name: String) -> Self {
        Self { table: Table::new(client, table_name, "comment_id") }
    }
}

#[async_trait]
impl CommentRepository for DynamoDbCommentRepository {
    async fn insert(&self, comment: &Comment) -> Result<(), RepoError> {
        self.table.put(comment_to_item(comment), comment.comment_id).await
    }

    async fn list_by_post(&self, post_id: &str) -> Result<Vec<Comment>, RepoError> {
        let items = self.table.scan_where(&[("post_id", post_id)]).await?;
        let mut comments = self.table.parse_all(items, item_to_comment)?;
        newest_first(&mut comments, |c| (c.created_at, c.comment_id));
        Ok(comments)
    }

    async fn delete_by_post(&self, post_id: &str) -> Result<usize, RepoError> {
        let comments = self.list_by_post(post_id).await?;
        for comment in &comments {
            self.table.delete(comment.comment_id).await?;
        }
        Ok(comments.len())
    }
}

#[derive(Debug, Clone)]
pub struct DynamoDbLikeRepository {
    table: Table,
}

impl DynamoDbLikeRepository {
    pub fn new(client: DynamoDbClient, table_name: String) -> Self {
        Self { table: Table::new(client, table_name, "like_id") }
    }
}

#[async_trait]
impl LikeRepository for DynamoDbLikeRepository {
    async fn find(&self, post_id: &str, user_id: &str) -> Result<Option<Like>, RepoError> {
        let items = self
            .table
            .scan_where(&[("post_id", post_id), ("user_id", user_id)])
            .await?;
        match items.into_iter().next() {
            Some(item) => self.table.parse(item, item_to_like).map(Some),
            None => Ok(None),
        }
    }

    async fn insert(&self, like: &Like) -> Result<(), RepoError> {
        self.table.put(like_to_item(like), like.like_id).await
    }

    async fn delete(&self, like_id: Uuid) -> Result<(), RepoError> {
        self.table.delete(like_id).await
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Like>, RepoError> {
        let items = self.table.scan_where(&[("user_id", user_id)]).await?;
        let mut likes = self.table.parse_all(items, item_to_like)?;
        newest_first(&mut likes, |l| (l.created_at, l.like_id));
        Ok(likes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_update_leaves_timestamps_alone() {
        assert_eq!(COUNTER_UPDATE, "ADD #counter :delta");
        assert!(!COUNTER_UPDATE.contains("updated_at"));
    }

    #[test]
    fn post_items_survive_conversion() {
        let now = Utc::now();
        let post = Post {
            post_id: Uuid::now_v7(),
            user_id: "u1".into(),
            photo_id: Uuid::now_v7().to_string(),
            photo_url: "/api/photos/x".into(),
            caption: "Sunset".into(),
            location: String::new(),
            likes: 3,
            shares: 0,
            comments: 1,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(item_to_post(&post_to_item(&post)), Some(post));
    }

    #[test]
    fn items_missing_required_attributes_are_rejected() {
        let mut item = like_to_item(&Like {
            like_id: Uuid::now_v7(),
            post_id: "p".into(),
            user_id: "u".into(),
            created_at: Utc::now(),
        });
        item.remove("user_id");
        assert!(item_to_like(&item).is_none());

        item.insert("user_id".into(), AttributeValue::N("1".into()));
        assert!(item_to_like(&item).is_none());
    }

    #[test]
    fn counters_default_to_zero_when_absent() {
        let mut item = post_to_item(&Post {
            post_id: Uuid::now_v7(),
            user_id: "u1".into(),
            photo_id: "p".into(),
            photo_url: "/api/photos/p".into(),
            caption: String::new(),
            location: String::new(),
            likes: 1,
            shares: 1,
            comments: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        });
        item.remove("shares");
        assert_eq!(item_to_post(&item).map(|p| p.shares), Some(0));
    }
}
