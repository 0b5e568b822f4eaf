// ── Inventory listings ──
//
// Small interactive listings: policy targets, access layers, the server's
// command catalog, and the cached copy of a single object.

use serde_json::{Map, Value, json};

use cpmirror_api::{ApiCall, ApiCommand};

use crate::catalog::{detail_params, paginate, take_items};
use crate::error::CoreError;
use crate::model::{DetailLevel, Layer, ObjectCategory};
use crate::store::{LocalStore, StoredObject};

/// Names of every gateway and server.
pub async fn all_targets<C: ApiCall>(session: &C, limit: u32) -> Result<Vec<String>, CoreError> {
    let category = ObjectCategory::GatewayOrServer;
    let command = ApiCommand::ShowAll(category.collection().into());
    let params = detail_params(DetailLevel::Standard);

    let items = paginate(session, &command, category.list_key(), limit, &params).await?;
    names_of(&command, items)
}

/// Every access layer as `(name, uid)`.
pub async fn all_layers<C: ApiCall>(session: &C, limit: u32) -> Result<Vec<Layer>, CoreError> {
    let command = ApiCommand::ShowAll("access-layers".into());
    let items = paginate(session, &command, "access-layers", limit, &Map::new()).await?;

    items
        .into_iter()
        .map(|item| {
            serde_json::from_value(item)
                .map_err(|e| CoreError::protocol(command.endpoint(), format!("malformed layer: {e}")))
        })
        .collect()
}

/// Every command the server exposes, from a single `show-commands` call.
pub async fn all_commands<C: ApiCall>(session: &C) -> Result<Vec<String>, CoreError> {
    let command = ApiCommand::ShowAll("commands".into());
    let mut body = session.call(&command, &json!({})).await?;
    let items = take_items(&command, &mut body, "commands")?;
    names_of(&command, items)
}

/// The cached document for `uid`, if the mirror holds one.
pub fn show_local<S: LocalStore>(store: &S, uid: &str) -> Result<Option<StoredObject>, CoreError> {
    Ok(store.get(uid)?)
}

fn names_of(command: &ApiCommand, items: Vec<Value>) -> Result<Vec<String>, CoreError> {
    items
        .into_iter()
        .map(|item| match item.get("name").and_then(Value::as_str) {
            Some(name) => Ok(name.to_owned()),
            None => Err(CoreError::protocol(
                command.endpoint(),
                format!("item without a name: {item}"),
            )),
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::catalog::tests::ScriptedSession;
    use crate::model::RemoteObject;
    use crate::store::SqliteStore;

    #[tokio::test]
    async fn targets_are_names_across_pages() {
        let session = ScriptedSession::new(vec![
            Ok(json!({ "objects": [{ "name": "gw1", "uid": "1" }], "to": 1, "total": 2 })),
            Ok(json!({ "objects": [{ "name": "mgmt", "uid": "2" }], "to": 2, "total": 2 })),
        ]);

        let targets = all_targets(&session, 1).await.unwrap();

        assert_eq!(targets, vec!["gw1", "mgmt"]);
        let requests = session.requests.lock().unwrap();
        assert_eq!(requests[0].0, "show-gateways-and-servers");
        assert_eq!(requests[0].1["details-level"], "standard");
    }

    #[tokio::test]
    async fn layers_use_their_own_list_key() {
        let session = ScriptedSession::new(vec![Ok(json!({
            "access-layers": [{ "name": "Network", "uid": "l-1", "domain": {} }],
            "to": 1,
            "total": 1
        }))]);

        let layers = all_layers(&session, 50).await.unwrap();

        assert_eq!(
            layers,
            vec![Layer {
                name: "Network".into(),
                uid: "l-1".into()
            }]
        );
    }

    #[tokio::test]
    async fn no_layers_is_one_call() {
        let session = ScriptedSession::new(vec![Ok(json!({ "access-layers": [], "total": 0 }))]);

        assert!(all_layers(&session, 50).await.unwrap().is_empty());
        assert_eq!(session.request_count(), 1);
    }

    #[tokio::test]
    async fn commands_come_from_one_call() {
        let session = ScriptedSession::new(vec![Ok(json!({
            "commands": [{ "name": "add-host" }, { "name": "show-hosts" }],
            "to": 2,
            "total": 500
        }))]);

        let commands = all_commands(&session).await.unwrap();

        assert_eq!(commands, vec!["add-host", "show-hosts"]);
        assert_eq!(session.request_count(), 1);
    }

    #[test]
    fn show_local_reads_the_cache() {
        let store = SqliteStore::in_memory().unwrap();
        let object: RemoteObject =
            serde_json::from_value(json!({ "uid": "u1", "type": "host", "name": "web" })).unwrap();
        store.insert_or_replace(&object).unwrap();
        store.commit().unwrap();

        let cached = show_local(&store, "u1").unwrap().unwrap();
        assert_eq!(cached.name.as_deref(), Some("web"));
        assert!(show_local(&store, "nope").unwrap().is_none());
    }
}
