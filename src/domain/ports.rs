use crate::core::proxy::{OutboundRequest, ProxyReply};
use crate::domain::model::{
    BlogPost, BlogPostPatch, NewBlogPost, NewSubscriber, Subscriber, SubscriberPatch,
};
use crate::utils::error::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// Delivers an outbound request to the upstream API, either in-process or
/// through a remote dashboard's proxy route.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: OutboundRequest) -> Result<ProxyReply>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn send(&self, request: OutboundRequest) -> Result<ProxyReply> {
        (**self).send(request).await
    }
}

pub trait ConfigProvider: Send + Sync {
    fn upstream_origin(&self) -> &str;
    fn allowed_origins(&self) -> &[String];
    fn default_headers(&self) -> Vec<(String, String)>;
    fn request_timeout(&self) -> Duration;
    fn bind_address(&self) -> &str;
    fn proxy_endpoint(&self) -> Option<&str>;
    fn auth_token(&self) -> Option<&str>;
    fn page_size(&self) -> u64;
}

/// A record type managed through a collection endpoint.
pub trait Resource: Clone + DeserializeOwned + Send + Sync + 'static {
    type Draft: Serialize + Send + Sync;
    type Patch: Serialize + Send + Sync;

    /// Path segment of the collection, also the list wrapper key.
    const COLLECTION: &'static str;
    /// Wrapper key of a single-record response.
    const ITEM_KEY: &'static str;

    fn id(&self) -> &str;
}

impl Resource for BlogPost {
    type Draft = NewBlogPost;
    type Patch = BlogPostPatch;

    const COLLECTION: &'static str = "blogs";
    const ITEM_KEY: &'static str = "blog";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Resource for Subscriber {
    type Draft = NewSubscriber;
    type Patch = SubscriberPatch;

    const COLLECTION: &'static str = "newsletter";
    const ITEM_KEY: &'static str = "subscriber";

    fn id(&self) -> &str {
        &self.id
    }
}
