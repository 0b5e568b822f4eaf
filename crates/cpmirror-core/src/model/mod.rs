// ── Domain model ──

pub mod object;
pub mod rule;

pub use object::{DetailLevel, ObjectCategory, RemoteObject};
pub use rule::{
    DictionaryEntry, Layer, RawEntry, RawRulebasePage, Reference, ResolvedEntry, ResolvedRule,
};
