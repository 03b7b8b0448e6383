use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }

    pub fn to_reqwest(self) -> reqwest::Method {
        match self {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            other => Err(format!("unsupported HTTP method: {}", other)),
        }
    }
}

/// 部落格文章
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogPost {
    #[serde(alias = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    #[serde(default)]
    pub published: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBlogPost {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    #[serde(default)]
    pub published: bool,
}

/// Only the fields present are sent; the backend keeps the rest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogPostPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<bool>,
}

impl BlogPostPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.slug.is_none()
            && self.excerpt.is_none()
            && self.content.is_none()
            && self.author.is_none()
            && self.tags.is_none()
            && self.cover_image.is_none()
            && self.published.is_none()
    }
}

/// 電子報訂閱者
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscriber {
    #[serde(alias = "_id")]
    pub id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscribed_at: Option<DateTime<Utc>>,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSubscriber {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubscriberPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

/// 網站頁面區塊（hero、about、contact...），每個 key 只有一筆
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSection {
    pub key: String,
    #[serde(default)]
    pub content: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub total_pages: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 10,
            total: 0,
            total_pages: 0,
        }
    }
}

impl Pagination {
    pub fn pages_for(total: u64, limit: u64) -> u64 {
        if limit == 0 {
            0
        } else {
            total.div_ceil(limit)
        }
    }

    pub fn recompute_pages(&mut self) {
        self.total_pages = Self::pages_for(self.total, self.limit);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub page: u64,
    pub limit: u64,
    pub search: Option<String>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 10,
            search: None,
        }
    }
}

impl ListQuery {
    pub fn new(page: u64, limit: u64) -> Self {
        Self {
            page,
            limit,
            search: None,
        }
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn to_query_string(&self) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        serializer.append_pair("page", &self.page.to_string());
        serializer.append_pair("limit", &self.limit.to_string());
        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            serializer.append_pair("search", search);
        }
        serializer.finish()
    }
}

impl<T: serde::de::DeserializeOwned> Paginated<T> {
    /// 解析列表回應，支援裸陣列與 `{ data | items | <collection>: [...] }` 包裝
    pub fn from_value(value: Value, collection_key: &str, query: &ListQuery) -> crate::Result<Self> {
        let (raw_items, meta) = match value {
            Value::Array(items) => (items, None),
            Value::Object(mut obj) => {
                let items = ["data", "items", collection_key]
                    .iter()
                    .find_map(|key| match obj.remove(*key) {
                        Some(Value::Array(items)) => Some(items),
                        Some(other) => {
                            obj.insert((*key).to_string(), other);
                            None
                        }
                        None => None,
                    })
                    .ok_or_else(|| crate::DashboardError::ValidationError {
                        message: format!(
                            "list response has no array under data, items or {}",
                            collection_key
                        ),
                    })?;
                (items, Some(obj))
            }
            other => {
                return Err(crate::DashboardError::ValidationError {
                    message: format!("unexpected list response: {}", other),
                })
            }
        };

        let items = raw_items
            .into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<T>, _>>()?;

        let source = meta.as_ref().map(|obj| match obj.get("pagination") {
            Some(Value::Object(p)) => p,
            _ => obj,
        });
        let read = |key: &str| source.and_then(|m| m.get(key)).and_then(Value::as_u64);

        let page = read("page").unwrap_or(query.page);
        let limit = read("limit").unwrap_or(query.limit);
        let total = read("total").unwrap_or(items.len() as u64);
        let total_pages = read("totalPages").unwrap_or_else(|| Pagination::pages_for(total, limit));

        Ok(Self {
            items,
            pagination: Pagination {
                page,
                limit,
                total,
                total_pages,
            },
        })
    }
}

/// 單筆回應可能是裸物件，或包在 `data` / `<item_key>` 之下
pub fn unwrap_item(value: Value, item_key: &str) -> Value {
    match value {
        Value::Object(mut obj) => {
            for key in ["data", item_key] {
                if matches!(obj.get(key), Some(Value::Object(_))) {
                    if let Some(inner) = obj.remove(key) {
                        return inner;
                    }
                }
            }
            Value::Object(obj)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_blog_post_accepts_underscore_id() {
        let post: BlogPost = serde_json::from_value(json!({
            "_id": "65f0",
            "title": "Hello",
            "content": "Body",
            "coverImage": "https://cdn.example.com/a.png",
            "createdAt": "2024-03-01T10:00:00Z"
        }))
        .unwrap();
        assert_eq!(post.id, "65f0");
        assert_eq!(post.cover_image.as_deref(), Some("https://cdn.example.com/a.png"));
        assert!(post.created_at.is_some());
        assert!(!post.published);
    }

    #[test]
    fn test_patch_skips_missing_fields() {
        let patch = BlogPostPatch {
            published: Some(true),
            ..Default::default()
        };
        let body = serde_json::to_value(&patch).unwrap();
        assert_eq!(body, json!({ "published": true }));
        assert!(!patch.is_empty());
        assert!(BlogPostPatch::default().is_empty());
    }

    #[test]
    fn test_paginated_from_bare_array() {
        let value = json!([{ "id": "1", "email": "a@example.com" }]);
        let page: Paginated<Subscriber> =
            Paginated::from_value(value, "newsletter", &ListQuery::new(1, 10)).unwrap();
        assert_eq!(page.items.len(), 1);
        assert!(page.items[0].active);
        assert_eq!(page.pagination.total, 1);
        assert_eq!(page.pagination.total_pages, 1);
    }

    #[test]
    fn test_paginated_from_wrapped_object() {
        let value = json!({
            "blogs": [{ "id": "1", "title": "A" }, { "id": "2", "title": "B" }],
            "pagination": { "page": 2, "limit": 2, "total": 7 }
        });
        let page: Paginated<BlogPost> =
            Paginated::from_value(value, "blogs", &ListQuery::new(1, 10)).unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.pagination.page, 2);
        assert_eq!(page.pagination.total, 7);
        assert_eq!(page.pagination.total_pages, 4);
    }

    #[test]
    fn test_paginated_reads_top_level_meta() {
        let value = json!({
            "data": [{ "id": "1", "title": "A" }],
            "total": 11,
            "totalPages": 3
        });
        let page: Paginated<BlogPost> =
            Paginated::from_value(value, "blogs", &ListQuery::new(3, 5)).unwrap();
        assert_eq!(page.pagination.page, 3);
        assert_eq!(page.pagination.limit, 5);
        assert_eq!(page.pagination.total_pages, 3);
    }

    #[test]
    fn test_paginated_rejects_object_without_items() {
        let value = json!({ "message": "ok" });
        let result: crate::Result<Paginated<BlogPost>> =
            Paginated::from_value(value, "blogs", &ListQuery::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_unwrap_item() {
        assert_eq!(unwrap_item(json!({ "data": { "id": "1" } }), "blog"), json!({ "id": "1" }));
        assert_eq!(unwrap_item(json!({ "blog": { "id": "2" } }), "blog"), json!({ "id": "2" }));
        assert_eq!(unwrap_item(json!({ "id": "3" }), "blog"), json!({ "id": "3" }));
    }

    #[test]
    fn test_query_string() {
        let query = ListQuery::new(2, 20).with_search("rust & go");
        assert_eq!(query.to_query_string(), "page=2&limit=20&search=rust+%26+go");
    }

    #[test]
    fn test_method_parsing() {
        assert_eq!("patch".parse::<HttpMethod>().unwrap(), HttpMethod::Patch);
        assert!("TRACE".parse::<HttpMethod>().is_err());
        assert_eq!(serde_json::to_value(HttpMethod::Delete).unwrap(), json!("DELETE"));
    }
}
