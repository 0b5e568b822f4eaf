// The closed set of Management API commands this client will issue.
//
// Every endpoint name is produced by rendering an `ApiCommand`; there is no
// way to send a request for a name that doesn't parse into one of these
// variants. Unsupported verbs fail at construction, not at call time.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// `verify-policy` / `install-policy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyAction {
    Verify,
    Install,
}

impl PolicyAction {
    fn as_str(self) -> &'static str {
        match self {
            Self::Verify => "verify",
            Self::Install => "install",
        }
    }
}

/// A Management API command, rendered to its `web_api/{endpoint}` name
/// via [`endpoint()`](Self::endpoint).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ApiCommand {
    Login,
    Logout,
    Keepalive,
    Publish,
    Discard,
    /// `add-{kind}`
    Add(String),
    /// `set-{kind}`
    Set(String),
    /// `delete-{kind}`
    Delete(String),
    /// `show-{kind}` for a single object.
    Show(String),
    /// `show-{collection}` for a paginated listing. The collection name is
    /// given verbatim because plurals are irregular (`services-tcp`,
    /// `gateways-and-servers`, `access-rulebase`).
    ShowAll(String),
    /// Generic lookup of any object by uid.
    ShowObject,
    Policy(PolicyAction),
    UnlockAdministrator,
    WhereUsed,
}

impl ApiCommand {
    /// The endpoint name appended to `/web_api/`.
    pub fn endpoint(&self) -> String {
        match self {
            Self::Login => "login".into(),
            Self::Logout => "logout".into(),
            Self::Keepalive => "keepalive".into(),
            Self::Publish => "publish".into(),
            Self::Discard => "discard".into(),
            Self::Add(kind) => format!("add-{kind}"),
            Self::Set(kind) => format!("set-{kind}"),
            Self::Delete(kind) => format!("delete-{kind}"),
            Self::Show(kind) | Self::ShowAll(kind) => format!("show-{kind}"),
            Self::ShowObject => "show-object".into(),
            Self::Policy(action) => format!("{}-policy", action.as_str()),
            Self::UnlockAdministrator => "unlock-administrator".into(),
            Self::WhereUsed => "where-used".into(),
        }
    }

    /// Build a kinded command (`add`, `set`, `delete`, `show`, `shows`)
    /// or a bare one from an action verb and optional object kind.
    pub fn from_parts(action: &str, kind: Option<&str>) -> Result<Self, Error> {
        let kinded = |ctor: fn(String) -> Self| {
            kind.filter(|k| valid_kind(k))
                .map(|k| ctor(k.to_owned()))
                .ok_or_else(|| Error::UnknownCommand(format!("{action} requires an object kind")))
        };

        match action {
            "add" => kinded(Self::Add),
            "set" => kinded(Self::Set),
            "delete" => kinded(Self::Delete),
            "show" => kinded(Self::Show),
            "shows" => kinded(|k| Self::ShowAll(format!("{k}s"))),
            other => other.parse(),
        }
    }

    /// Whether the command only reads state. Mutations need a `publish`
    /// before other sessions see them.
    pub fn is_read_only(&self) -> bool {
        matches!(
            self,
            Self::Show(_) | Self::ShowAll(_) | Self::ShowObject | Self::WhereUsed | Self::Keepalive
        )
    }
}

impl fmt::Display for ApiCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.endpoint())
    }
}

impl FromStr for ApiCommand {
    type Err = Error;

    /// Parse a full endpoint name such as `show-hosts` or `install-policy`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fixed = match s {
            "login" => Some(Self::Login),
            "logout" => Some(Self::Logout),
            "keepalive" => Some(Self::Keepalive),
            "publish" => Some(Self::Publish),
            "discard" => Some(Self::Discard),
            "show-object" => Some(Self::ShowObject),
            "verify-policy" => Some(Self::Policy(PolicyAction::Verify)),
            "install-policy" => Some(Self::Policy(PolicyAction::Install)),
            "unlock-administrator" => Some(Self::UnlockAdministrator),
            "where-used" => Some(Self::WhereUsed),
            _ => None,
        };
        if let Some(cmd) = fixed {
            return Ok(cmd);
        }

        let prefixed: [(&str, fn(String) -> Self); 4] = [
            ("add-", Self::Add),
            ("set-", Self::Set),
            ("delete-", Self::Delete),
            ("show-", Self::Show),
        ];
        for (prefix, ctor) in prefixed {
            if let Some(kind) = s.strip_prefix(prefix) {
                if valid_kind(kind) {
                    return Ok(ctor(kind.to_owned()));
                }
            }
        }

        Err(Error::UnknownCommand(s.to_owned()))
    }
}

/// Object kinds are lowercase words joined by dashes.
fn valid_kind(kind: &str) -> bool {
    !kind.is_empty()
        && !kind.starts_with('-')
        && !kind.ends_with('-')
        && kind
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn renders_kinded_endpoints() {
        assert_eq!(ApiCommand::Add("host".into()).endpoint(), "add-host");
        assert_eq!(ApiCommand::Show("service-tcp".into()).endpoint(), "show-service-tcp");
        assert_eq!(
            ApiCommand::ShowAll("gateways-and-servers".into()).endpoint(),
            "show-gateways-and-servers"
        );
        assert_eq!(
            ApiCommand::Policy(PolicyAction::Install).endpoint(),
            "install-policy"
        );
    }

    #[test]
    fn parses_fixed_and_prefixed_names() {
        assert_eq!("publish".parse::<ApiCommand>().unwrap(), ApiCommand::Publish);
        assert_eq!(
            "delete-network".parse::<ApiCommand>().unwrap(),
            ApiCommand::Delete("network".into())
        );
        assert_eq!(
            "verify-policy".parse::<ApiCommand>().unwrap(),
            ApiCommand::Policy(PolicyAction::Verify)
        );
    }

    #[test]
    fn unknown_verbs_are_rejected_at_construction() {
        assert!(matches!(
            "run-script".parse::<ApiCommand>(),
            Err(Error::UnknownCommand(_))
        ));
        assert!(matches!(
            "show-".parse::<ApiCommand>(),
            Err(Error::UnknownCommand(_))
        ));
        assert!(matches!(
            "add-Host".parse::<ApiCommand>(),
            Err(Error::UnknownCommand(_))
        ));
    }

    #[test]
    fn from_parts_builds_plural_listing() {
        let cmd = ApiCommand::from_parts("shows", Some("command")).unwrap();
        assert_eq!(cmd.endpoint(), "show-commands");

        let cmd = ApiCommand::from_parts("keepalive", None).unwrap();
        assert_eq!(cmd, ApiCommand::Keepalive);

        assert!(ApiCommand::from_parts("add", None).is_err());
    }

    #[test]
    fn read_only_classification() {
        assert!(ApiCommand::ShowObject.is_read_only());
        assert!(!ApiCommand::Set("host".into()).is_read_only());
        assert!(!ApiCommand::Publish.is_read_only());
    }
}
