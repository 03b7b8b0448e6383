use crate::core::api::ApiClient;
use crate::domain::model::{unwrap_item, PageSection};
use crate::domain::ports::Transport;
use crate::utils::error::{DashboardError, Result};
use serde_json::{json, Map, Value};
use tokio::sync::{watch, Mutex};

const SECTIONS_PATH: &str = "sections";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectionState {
    pub record: Option<PageSection>,
    pub loading: bool,
    pub error: Option<String>,
}

/// 每個 key 一筆，讀取、就地修改、存回
pub struct SectionStore<T: Transport> {
    api: ApiClient<T>,
    state: watch::Sender<SectionState>,
    in_flight: Mutex<()>,
}

impl<T: Transport> SectionStore<T> {
    pub fn new(api: ApiClient<T>) -> Self {
        let (state, _) = watch::channel(SectionState::default());
        Self {
            api,
            state,
            in_flight: Mutex::new(()),
        }
    }

    pub fn snapshot(&self) -> SectionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SectionState> {
        self.state.subscribe()
    }

    fn section_url(key: &str) -> Result<String> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(DashboardError::ValidationError {
                message: format!("invalid section key: '{}'", key),
            });
        }
        Ok(format!("{}/{}", SECTIONS_PATH, key))
    }

    fn begin(&self) {
        self.state.send_modify(|s| {
            s.loading = true;
            s.error = None;
        });
    }

    fn finish(&self, result: &Result<PageSection>) {
        self.state.send_modify(|s| {
            s.loading = false;
            match result {
                Ok(section) => s.record = Some(section.clone()),
                Err(e) => s.error = Some(e.user_friendly_message()),
            }
        });
    }

    pub async fn fetch(&self, key: &str) -> Result<PageSection> {
        let _guard = self.in_flight.lock().await;
        self.begin();

        let result = async {
            let value = self.api.get(&Self::section_url(key)?).await?;
            parse_section(key, value)
        }
        .await;

        if let Err(e) = &result {
            tracing::warn!("section {} fetch failed: {}", key, e);
        }
        self.finish(&result);
        result
    }

    pub async fn save(&self, key: &str, content: Value) -> Result<PageSection> {
        let _guard = self.in_flight.lock().await;
        self.begin();

        let result = async {
            let url = Self::section_url(key)?;
            let value = self.api.put(&url, &json!({ "content": content })).await?;
            // 後端沒有回傳內容時沿用送出的版本
            if value.is_null() {
                return Ok(PageSection {
                    key: key.to_string(),
                    content: content.clone(),
                    updated_at: None,
                });
            }
            parse_section(key, value)
        }
        .await;

        match &result {
            Ok(_) => tracing::info!("section {} saved", key),
            Err(e) => tracing::warn!("section {} save failed: {}", key, e),
        }
        self.finish(&result);
        result
    }
}

/// Accepts `{ key, content, updatedAt }` records, optionally wrapped, or a
/// bare document that is the content itself.
pub fn parse_section(key: &str, value: Value) -> Result<PageSection> {
    match unwrap_item(value, "section") {
        Value::Object(mut obj) if obj.contains_key("content") => {
            obj.entry("key").or_insert_with(|| Value::String(key.to_string()));
            Ok(serde_json::from_value(Value::Object(obj))?)
        }
        Value::Null => Ok(PageSection {
            key: key.to_string(),
            content: Value::Object(Map::new()),
            updated_at: None,
        }),
        other => Ok(PageSection {
            key: key.to_string(),
            content: other,
            updated_at: None,
        }),
    }
}

/// Parses a `path=value` edit. The value is taken as JSON when it parses,
/// otherwise as a plain string.
pub fn parse_assignment(input: &str) -> Result<(String, Value)> {
    let (path, raw) = input
        .split_once('=')
        .ok_or_else(|| DashboardError::ValidationError {
            message: format!("expected path=value, got '{}'", input),
        })?;
    let path = path.trim();
    if path.is_empty() {
        return Err(DashboardError::ValidationError {
            message: format!("missing field path in '{}'", input),
        });
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((path.to_string(), value))
}

/// Sets the field at a dotted path, creating intermediate objects.
pub fn set_field(root: &mut Value, path: &str, new_value: Value) -> Result<()> {
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(DashboardError::ValidationError {
            message: format!("invalid field path: '{}'", path),
        });
    }

    let (last, parents) = segments
        .split_last()
        .ok_or_else(|| DashboardError::ValidationError {
            message: "field path is empty".to_string(),
        })?;

    let mut current = root;
    for segment in parents {
        current = child_mut(current, segment, path)?;
    }

    if current.is_null() {
        *current = Value::Object(Map::new());
    }
    match current {
        Value::Object(map) => {
            map.insert((*last).to_string(), new_value);
            Ok(())
        }
        Value::Array(items) => {
            let slot = array_index(items.len(), last, path)?;
            items[slot] = new_value;
            Ok(())
        }
        _ => Err(not_a_container(path, last)),
    }
}

fn child_mut<'a>(current: &'a mut Value, segment: &str, path: &str) -> Result<&'a mut Value> {
    if current.is_null() {
        *current = Value::Object(Map::new());
    }
    match current {
        Value::Object(map) => Ok(map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()))),
        Value::Array(items) => {
            let slot = array_index(items.len(), segment, path)?;
            Ok(&mut items[slot])
        }
        _ => Err(not_a_container(path, segment)),
    }
}

fn array_index(len: usize, segment: &str, path: &str) -> Result<usize> {
    match segment.parse::<usize>() {
        Ok(idx) if idx < len => Ok(idx),
        Ok(idx) => Err(DashboardError::ValidationError {
            message: format!("index {} out of bounds (len {}) in '{}'", idx, len, path),
        }),
        Err(_) => Err(DashboardError::ValidationError {
            message: format!("'{}' is not an array index in '{}'", segment, path),
        }),
    }
}

fn not_a_container(path: &str, segment: &str) -> DashboardError {
    DashboardError::ValidationError {
        message: format!("cannot set '{}' in '{}': parent is not an object", segment, path),
    }
}
