use crate::core::api::ApiClient;
use crate::domain::model::{unwrap_item, ListQuery, Paginated, Pagination};
use crate::domain::ports::{Resource, Transport};
use crate::utils::error::{DashboardError, Result};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde_json::Value;
use tokio::sync::{watch, Mutex};

// 路徑片段內要編碼的字元，`/` 也要編碼才不會多出一層路徑
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'\\')
    .add(b'`')
    .add(b'{')
    .add(b'}');

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    FetchAll,
    FetchOne,
    Create,
    Update,
    Delete,
}

impl Operation {
    pub fn label(&self) -> &'static str {
        match self {
            Operation::FetchAll => "fetch list",
            Operation::FetchOne => "fetch item",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone)]
pub enum Action<R> {
    Pending(Operation),
    ListLoaded(Paginated<R>),
    ItemLoaded(R),
    Created(R),
    Updated(R),
    Deleted(String),
    Rejected(Operation, String),
    ClearError,
    ClearSelected,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceState<R> {
    pub items: Vec<R>,
    pub selected: Option<R>,
    pub loading: bool,
    pub error: Option<String>,
    pub pagination: Pagination,
}

impl<R> Default for ResourceState<R> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            selected: None,
            loading: false,
            error: None,
            pagination: Pagination::default(),
        }
    }
}

impl<R: Resource> ResourceState<R> {
    pub fn find(&self, id: &str) -> Option<&R> {
        self.items.iter().find(|item| item.id() == id)
    }

    pub fn reduce(&mut self, action: Action<R>) {
        match action {
            Action::Pending(_) => {
                self.loading = true;
                self.error = None;
            }
            Action::ListLoaded(page) => {
                self.loading = false;
                self.items = page.items;
                self.pagination = page.pagination;
            }
            Action::ItemLoaded(item) => {
                self.loading = false;
                self.selected = Some(item);
            }
            Action::Created(item) => {
                self.loading = false;
                self.items.insert(0, item);
                self.pagination.total += 1;
                self.pagination.recompute_pages();
            }
            Action::Updated(item) => {
                self.loading = false;
                if let Some(existing) = self.items.iter_mut().find(|i| i.id() == item.id()) {
                    *existing = item.clone();
                }
                if self.selected.as_ref().map(|s| s.id() == item.id()).unwrap_or(false) {
                    self.selected = Some(item);
                }
            }
            Action::Deleted(id) => {
                self.loading = false;
                self.items.retain(|i| i.id() != id);
                self.pagination.total = self.pagination.total.saturating_sub(1);
                self.pagination.recompute_pages();
                if self.selected.as_ref().map(|s| s.id() == id).unwrap_or(false) {
                    self.selected = None;
                }
            }
            Action::Rejected(_, message) => {
                self.loading = false;
                self.error = Some(message);
            }
            Action::ClearError => self.error = None,
            Action::ClearSelected => self.selected = None,
        }
    }
}

/// 每個 CRUD 呼叫先送 `Pending`，完成後送結果或 `Rejected`
pub struct ResourceStore<R: Resource, T: Transport> {
    api: ApiClient<T>,
    state: watch::Sender<ResourceState<R>>,
    // 同一時間只有一個請求在途
    in_flight: Mutex<()>,
}

impl<R: Resource, T: Transport> ResourceStore<R, T> {
    pub fn new(api: ApiClient<T>) -> Self {
        let (state, _) = watch::channel(ResourceState::default());
        Self {
            api,
            state,
            in_flight: Mutex::new(()),
        }
    }

    pub fn snapshot(&self) -> ResourceState<R> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ResourceState<R>> {
        self.state.subscribe()
    }

    pub fn dispatch(&self, action: Action<R>) {
        self.state.send_modify(|state| state.reduce(action));
    }

    pub fn clear_error(&self) {
        self.dispatch(Action::ClearError);
    }

    pub fn clear_selected(&self) {
        self.dispatch(Action::ClearSelected);
    }

    fn item_url(id: &str) -> Result<String> {
        if id.trim().is_empty() {
            return Err(DashboardError::ValidationError {
                message: format!("{} id cannot be empty", R::ITEM_KEY),
            });
        }
        Ok(format!(
            "{}/{}",
            R::COLLECTION,
            utf8_percent_encode(id, PATH_SEGMENT)
        ))
    }

    fn parse_item(value: Value) -> Result<R> {
        Ok(serde_json::from_value(unwrap_item(value, R::ITEM_KEY))?)
    }

    /// Dispatches the outcome of `result`, keeping the error for the caller.
    fn settle<V>(
        &self,
        op: Operation,
        result: Result<V>,
        fulfil: impl FnOnce(&V) -> Action<R>,
    ) -> Result<V> {
        match &result {
            Ok(value) => self.dispatch(fulfil(value)),
            Err(e) => {
                tracing::warn!("{} {} failed: {}", R::COLLECTION, op.label(), e);
                self.dispatch(Action::Rejected(op, e.user_friendly_message()));
            }
        }
        result
    }

    pub async fn fetch_all(&self, query: &ListQuery) -> Result<Paginated<R>> {
        let _guard = self.in_flight.lock().await;
        self.dispatch(Action::Pending(Operation::FetchAll));

        let url = format!("{}?{}", R::COLLECTION, query.to_query_string());
        let result = async {
            let value = self.api.get(&url).await?;
            Paginated::from_value(value, R::COLLECTION, query)
        }
        .await;

        self.settle(Operation::FetchAll, result, |page| Action::ListLoaded(page.clone()))
    }

    pub async fn fetch_one(&self, id: &str) -> Result<R> {
        let _guard = self.in_flight.lock().await;
        self.dispatch(Action::Pending(Operation::FetchOne));

        let result = async {
            let value = self.api.get(&Self::item_url(id)?).await?;
            Self::parse_item(value)
        }
        .await;

        self.settle(Operation::FetchOne, result, |item| Action::ItemLoaded(item.clone()))
    }

    pub async fn create(&self, draft: &R::Draft) -> Result<R> {
        let _guard = self.in_flight.lock().await;
        self.dispatch(Action::Pending(Operation::Create));

        let result = async {
            let value = self.api.post(R::COLLECTION, draft).await?;
            Self::parse_item(value)
        }
        .await;

        self.settle(Operation::Create, result, |item| Action::Created(item.clone()))
    }

    pub async fn update(&self, id: &str, patch: &R::Patch) -> Result<R> {
        let _guard = self.in_flight.lock().await;
        self.dispatch(Action::Pending(Operation::Update));

        let result = async {
            let value = self.api.put(&Self::item_url(id)?, patch).await?;
            Self::parse_item(value)
        }
        .await;

        self.settle(Operation::Update, result, |item| Action::Updated(item.clone()))
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        let _guard = self.in_flight.lock().await;
        self.dispatch(Action::Pending(Operation::Delete));

        let result = async {
            self.api.delete(&Self::item_url(id)?).await?;
            Ok::<(), DashboardError>(())
        }
        .await;

        self.settle(Operation::Delete, result, |_| Action::Deleted(id.to_string()))
    }
}
