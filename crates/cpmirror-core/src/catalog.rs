// ── Paginated catalog access ──
//
// Every list endpoint answers with `{<list key>: [...], from, to, total}`.
// `scan` drives the offset loop once; `paginate` collects the items and
// the category helpers put names on the common calls.

use serde_json::{Map, Value, json};
use tracing::debug;

use cpmirror_api::{ApiCall, ApiCommand};

use crate::error::CoreError;
use crate::model::{DetailLevel, ObjectCategory, RemoteObject};

/// Progress counters carried by one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageProgress {
    /// Items on this page.
    pub received: usize,
    /// Items returned so far across the scan.
    pub to: Option<u64>,
    /// Items the scan will return in total.
    pub total: Option<u64>,
}

impl PageProgress {
    /// Read `to`/`total` from a reply body.
    pub fn from_body(body: &Value, received: usize) -> Self {
        Self {
            received,
            to: body.get("to").and_then(Value::as_u64),
            total: body.get("total").and_then(Value::as_u64),
        }
    }
}

/// Take the item array out of a list reply. A missing key is a protocol
/// violation, never an empty page.
pub fn take_items(command: &ApiCommand, body: &mut Value, list_key: &str) -> Result<Vec<Value>, CoreError> {
    match body.get_mut(list_key).map(Value::take) {
        Some(Value::Array(items)) => Ok(items),
        Some(other) => Err(CoreError::protocol(
            command.endpoint(),
            format!("`{list_key}` is not an array: {other}"),
        )),
        None => Err(CoreError::protocol(
            command.endpoint(),
            format!("reply has no `{list_key}` field"),
        )),
    }
}

/// Drive one paginated scan of `command`, handing each reply body to
/// `visit` in offset order.
///
/// `visit` reports how many items the page held; the loop stops when the
/// reply has no `total`, when `total` is zero, or when `to == total`.
pub async fn scan<C, F>(
    session: &C,
    command: &ApiCommand,
    limit: u32,
    params: &Map<String, Value>,
    mut visit: F,
) -> Result<(), CoreError>
where
    C: ApiCall,
    F: FnMut(Value) -> Result<PageProgress, CoreError>,
{
    let mut offset: u64 = 0;

    loop {
        let mut payload = params.clone();
        payload.insert("limit".into(), json!(limit));
        payload.insert("offset".into(), json!(offset));

        let body = session.call(command, &Value::Object(payload)).await?;
        let progress = visit(body)?;
        debug!(%command, offset, ?progress, "page received");

        let total = match progress.total {
            None | Some(0) => return Ok(()),
            Some(total) => total,
        };
        let to = progress.to.ok_or_else(|| {
            CoreError::protocol(command.endpoint(), "reply has `total` but no `to`")
        })?;
        if to == total {
            return Ok(());
        }
        if to > total {
            return Err(CoreError::protocol(
                command.endpoint(),
                format!("page at offset {offset} runs past the end: to={to}, total={total}"),
            ));
        }
        if progress.received == 0 {
            return Err(CoreError::protocol(
                command.endpoint(),
                format!("empty page at offset {offset} with to={to}, total={total}"),
            ));
        }

        offset += u64::from(limit);
    }
}

/// Collect every item of a paginated listing.
pub async fn paginate<C: ApiCall>(
    session: &C,
    command: &ApiCommand,
    list_key: &str,
    limit: u32,
    params: &Map<String, Value>,
) -> Result<Vec<Value>, CoreError> {
    let mut all = Vec::new();
    scan(session, command, limit, params, |mut body| {
        let items = take_items(command, &mut body, list_key)?;
        let progress = PageProgress::from_body(&body, items.len());
        all.extend(items);
        Ok(progress)
    })
    .await?;
    Ok(all)
}

pub(crate) fn detail_params(detail: DetailLevel) -> Map<String, Value> {
    let mut params = Map::new();
    params.insert("details-level".into(), json!(detail.to_string()));
    params
}

/// Every item of one category, as returned at the requested detail level.
pub async fn fetch_all<C: ApiCall>(
    session: &C,
    category: ObjectCategory,
    detail: DetailLevel,
    limit: u32,
) -> Result<Vec<Value>, CoreError> {
    let command = ApiCommand::ShowAll(category.collection().into());
    paginate(session, &command, category.list_key(), limit, &detail_params(detail)).await
}

/// Every object of one category with all fields.
pub async fn fetch_objects<C: ApiCall>(
    session: &C,
    category: ObjectCategory,
    limit: u32,
) -> Result<Vec<RemoteObject>, CoreError> {
    fetch_all(session, category, DetailLevel::Full, limit)
        .await?
        .into_iter()
        .map(|item| {
            serde_json::from_value(item).map_err(|e| {
                CoreError::protocol(
                    format!("show-{}", category.collection()),
                    format!("malformed object: {e}"),
                )
            })
        })
        .collect()
}

/// Every uid of one category.
///
/// With `details-level: uid` the server returns bare strings; objects
/// carrying a `uid` field are accepted as well.
pub async fn fetch_uids<C: ApiCall>(
    session: &C,
    category: ObjectCategory,
    limit: u32,
) -> Result<Vec<String>, CoreError> {
    fetch_all(session, category, DetailLevel::Uid, limit)
        .await?
        .into_iter()
        .map(|item| match item {
            Value::String(uid) => Ok(uid),
            Value::Object(mut map) => match map.remove("uid") {
                Some(Value::String(uid)) => Ok(uid),
                _ => Err(CoreError::protocol(
                    format!("show-{}", category.collection()),
                    "object item without a uid",
                )),
            },
            other => Err(CoreError::protocol(
                format!("show-{}", category.collection()),
                format!("unexpected uid item: {other}"),
            )),
        })
        .collect()
}

/// The category's reported `total`, from a one-item probe.
pub async fn probe_total<C: ApiCall>(session: &C, category: ObjectCategory) -> Result<u64, CoreError> {
    let command = ApiCommand::ShowAll(category.collection().into());
    let mut payload = detail_params(DetailLevel::Uid);
    payload.insert("limit".into(), json!(1));
    payload.insert("offset".into(), json!(0));

    let body = session.call(&command, &Value::Object(payload)).await?;
    body.get("total")
        .and_then(Value::as_u64)
        .ok_or_else(|| CoreError::protocol(command.endpoint(), "reply has no `total` field"))
}
