// ── Remote objects and the category table ──
//
// A remote object is an open-ended JSON document with three fields we
// care about: `uid`, `type`, and (usually) `name`. Everything else rides
// along in `fields` so the mirror stores exactly what the server sent.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// A document from the remote object catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteObject {
    pub uid: String,
    #[serde(rename = "type")]
    pub object_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// How much of each object a list call returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum DetailLevel {
    /// Bare uid strings.
    Uid,
    /// uid, name, type, and a few common fields.
    Standard,
    /// Every field of every object.
    Full,
}

/// The object categories the mirror pulls.
///
/// Each variant maps to exactly one list endpoint via
/// [`collection()`](Self::collection). Adding a category means adding a
/// variant here and an arm there; the match keeps the two in step.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum ObjectCategory {
    Host,
    Network,
    AddressRange,
    Group,
    GatewayOrServer,
    AccessRole,
    ServiceTcp,
    ServiceUdp,
    ServiceIcmp,
    ServiceGroup,
}

impl ObjectCategory {
    /// The `show-{collection}` list endpoint for this category.
    pub fn collection(self) -> &'static str {
        match self {
            Self::Host => "hosts",
            Self::Network => "networks",
            Self::AddressRange => "address-ranges",
            Self::Group => "groups",
            Self::GatewayOrServer => "gateways-and-servers",
            Self::AccessRole => "access-roles",
            Self::ServiceTcp => "services-tcp",
            Self::ServiceUdp => "services-udp",
            Self::ServiceIcmp => "services-icmp",
            Self::ServiceGroup => "service-groups",
        }
    }

    /// The key holding the item array in list replies.
    pub fn list_key(self) -> &'static str {
        "objects"
    }
}
