// ── Rulebase shapes ──
//
// Raw types mirror `show-access-rulebase` replies: entries reference
// objects by uid only and ship an `objects-dictionary` alongside.
// Resolved types are what consumers render.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One page of `show-access-rulebase`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRulebasePage {
    #[serde(default)]
    pub rulebase: Vec<RawEntry>,
    #[serde(rename = "objects-dictionary", default)]
    pub objects_dictionary: Vec<DictionaryEntry>,
    pub to: Option<u64>,
    pub total: Option<u64>,
}

/// `{uid, name}` pair from the page's object dictionary.
#[derive(Debug, Clone, Deserialize)]
pub struct DictionaryEntry {
    pub uid: String,
    pub name: Option<String>,
}

/// A rule, a section, or a bare container of rules.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RawEntry {
    #[serde(rename = "type")]
    pub entry_type: Option<String>,
    pub uid: Option<String>,
    pub name: Option<String>,
    #[serde(alias = "num")]
    pub rule_number: Option<u64>,
    #[serde(default)]
    pub source: Vec<String>,
    #[serde(default)]
    pub source_negate: bool,
    #[serde(default)]
    pub destination: Vec<String>,
    #[serde(default)]
    pub destination_negate: bool,
    #[serde(default)]
    pub service: Vec<String>,
    #[serde(default)]
    pub service_negate: bool,
    pub action: Option<String>,
    /// Either a bare uid or `{type: uid, ...}`.
    pub track: Option<Value>,
    #[serde(default, alias = "install-on")]
    pub target: Vec<String>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    /// Sub-rulebase, present on sections and bare containers.
    pub rulebase: Option<Vec<RawEntry>>,
}

fn enabled_by_default() -> bool {
    true
}

/// A referenced object after lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub name: String,
    pub uid: String,
}

/// An access rule with every reference replaced by names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[allow(clippy::struct_excessive_bools)]
pub struct ResolvedRule {
    pub number: Option<u64>,
    pub name: String,
    pub source: Vec<Reference>,
    pub source_negate: bool,
    pub destination: Vec<Reference>,
    pub destination_negate: bool,
    pub service: Vec<Reference>,
    pub service_negate: bool,
    pub action: String,
    pub track: String,
    pub target: Vec<Reference>,
    pub enabled: bool,
}

/// One line of a flattened, resolved rulebase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ResolvedEntry {
    #[serde(rename = "accessrule")]
    Rule(ResolvedRule),
    #[serde(rename = "accesssection")]
    Section { name: String },
}

/// An access layer as listed by `show-access-layers`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layer {
    pub name: String,
    pub uid: String,
}
