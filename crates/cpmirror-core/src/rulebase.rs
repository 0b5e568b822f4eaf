// ── Rule resolution ──
//
// Access rules reference objects by uid only. Each rulebase page ships an
// `objects-dictionary` with the uid -> name pairs its rules use; resolution
// flattens the page's section tree and swaps every reference for a name.

use std::collections::HashMap;

use serde_json::{Value, json};
use tracing::debug;

use cpmirror_api::{ApiCall, ApiCommand};

use crate::catalog::{self, PageProgress};
use crate::error::CoreError;
use crate::model::{DetailLevel, DictionaryEntry, RawEntry, RawRulebasePage, Reference, ResolvedEntry, ResolvedRule};

const ACCESS_RULE: &str = "access-rule";
const ACCESS_SECTION: &str = "access-section";

/// uid -> name lookup over one page's dictionary.
///
/// The first entry for a uid wins; entries without a name resolve nothing.
#[derive(Debug, Default)]
pub struct ObjectIndex<'a> {
    names: HashMap<&'a str, &'a str>,
}

impl<'a> ObjectIndex<'a> {
    pub fn new(dictionary: &'a [DictionaryEntry]) -> Self {
        let mut names = HashMap::with_capacity(dictionary.len());
        for entry in dictionary {
            if let Some(name) = entry.name.as_deref() {
                names.entry(entry.uid.as_str()).or_insert(name);
            }
        }
        Self { names }
    }

    pub fn name_of(&self, uid: &str) -> Option<&'a str> {
        self.names.get(uid).copied()
    }

    /// The dictionary name for `value`, or `value` itself.
    fn scalar(&self, value: &str) -> String {
        self.name_of(value).unwrap_or(value).to_owned()
    }

    /// Resolved pairs in input order; unknown uids are dropped.
    fn references(&self, uids: &[String]) -> Vec<Reference> {
        uids.iter()
            .filter_map(|uid| {
                self.name_of(uid).map(|name| Reference {
                    name: name.to_owned(),
                    uid: uid.clone(),
                })
            })
            .collect()
    }
}

/// Flatten and resolve one rulebase page, preserving server order.
///
/// - `access-rule` entries resolve to [`ResolvedEntry::Rule`].
/// - `access-section` entries become a section marker, followed by their
///   own rules when they carry a nested `rulebase`.
/// - Any other entry with a nested `rulebase` contributes its rules only.
///
/// Nesting is followed one level deep.
pub fn resolve_page(page: &RawRulebasePage) -> Vec<ResolvedEntry> {
    let index = ObjectIndex::new(&page.objects_dictionary);
    let mut resolved = Vec::with_capacity(page.rulebase.len());

    for entry in &page.rulebase {
        match entry.entry_type.as_deref() {
            Some(ACCESS_RULE) => resolved.push(ResolvedEntry::Rule(resolve_rule(entry, &index))),
            Some(ACCESS_SECTION) => {
                resolved.push(ResolvedEntry::Section {
                    name: entry.name.clone().unwrap_or_default(),
                });
                resolve_nested(entry, &index, &mut resolved);
            }
            _ if entry.rulebase.is_some() => resolve_nested(entry, &index, &mut resolved),
            other => debug!(entry_type = ?other, uid = ?entry.uid, "skipping rulebase entry"),
        }
    }

    resolved
}

fn resolve_nested(container: &RawEntry, index: &ObjectIndex<'_>, out: &mut Vec<ResolvedEntry>) {
    let Some(children) = &container.rulebase else {
        return;
    };
    out.extend(
        children
            .iter()
            .filter(|child| child.entry_type.as_deref() == Some(ACCESS_RULE))
            .map(|child| ResolvedEntry::Rule(resolve_rule(child, index))),
    );
}

/// Resolve every reference on a single rule.
pub fn resolve_rule(rule: &RawEntry, index: &ObjectIndex<'_>) -> ResolvedRule {
    let track = match &rule.track {
        Some(Value::String(uid)) => index.scalar(uid),
        Some(Value::Object(fields)) => fields
            .get("type")
            .and_then(Value::as_str)
            .map(|uid| index.scalar(uid))
            .unwrap_or_default(),
        _ => String::new(),
    };

    ResolvedRule {
        number: rule.rule_number,
        name: rule.name.as_deref().map(|n| index.scalar(n)).unwrap_or_default(),
        source: index.references(&rule.source),
        source_negate: rule.source_negate,
        destination: index.references(&rule.destination),
        destination_negate: rule.destination_negate,
        service: index.references(&rule.service),
        service_negate: rule.service_negate,
        action: rule.action.as_deref().map(|a| index.scalar(a)).unwrap_or_default(),
        track,
        target: index.references(&rule.target),
        enabled: rule.enabled,
    }
}

/// Page through `show-access-rulebase` for `layer`, resolving each page
/// against its own dictionary.
pub async fn fetch_rulebase<C: ApiCall>(
    session: &C,
    layer: &str,
    limit: u32,
) -> Result<Vec<ResolvedEntry>, CoreError> {
    let command = ApiCommand::ShowAll("access-rulebase".into());
    let mut params = catalog::detail_params(DetailLevel::Standard);
    params.insert("name".into(), json!(layer));
    params.insert("use-object-dictionary".into(), json!(true));

    let mut resolved = Vec::new();
    catalog::scan(session, &command, limit, &params, |body| {
        if body.get("rulebase").is_none() {
            return Err(CoreError::protocol(command.endpoint(), "reply has no `rulebase` field"));
        }
        let page: RawRulebasePage = serde_json::from_value(body)
            .map_err(|e| CoreError::protocol(command.endpoint(), format!("malformed page: {e}")))?;
        resolved.extend(resolve_page(&page));
        Ok(PageProgress {
            received: page.rulebase.len(),
            to: page.to,
            total: page.total,
        })
    })
    .await?;

    debug!(layer, entries = resolved.len(), "rulebase resolved");
    Ok(resolved)
}
