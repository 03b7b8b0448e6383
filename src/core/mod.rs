pub mod api;
pub mod proxy;
pub mod render;
pub mod sections;
pub mod server;
pub mod slice;

pub use crate::domain::model::{BlogPost, PageSection, Paginated, Pagination, Subscriber};
pub use crate::domain::ports::{ConfigProvider, Resource, Transport};
pub use crate::utils::error::Result;
