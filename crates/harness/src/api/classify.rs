//! Method classification for the management API.
//!
//! Which credential a method needs and which HTTP verb carries it are
//! both decided here, from explicit tables, so the rules are visible and
//! unit-testable instead of being substring checks scattered across call
//! sites.

/// Namespaces whose methods must run under the single shared
/// administrative credential, and therefore under the process-wide gate.
const PRIVILEGED_NAMESPACES: &[&str] = &["user", "org", "admin"];

/// Leaf-name prefixes that read state and travel as GET
const GET_PREFIXES: &[&str] = &["list", "get", "is", "find"];

/// Full method names that are GET despite not matching a prefix
const GET_EXCEPTIONS: &[&str] = &["api.systemVersion", "api.productName"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    /// The shared administrative credential, serialized process-wide
    Admin,
    /// The calling session's own credential
    Caller,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVerb {
    Get,
    Post,
}

/// Classification of one API method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodClass {
    pub credential: CredentialKind,
    pub verb: HttpVerb,
}

/// Classify a dotted method name such as `user.create` or
/// `system.listActiveSystems`.
pub fn classify(method: &str) -> MethodClass {
    let (namespace, leaf) = match method.rsplit_once('.') {
        Some((ns, leaf)) => (ns, leaf),
        None => ("", method),
    };

    let credential = if PRIVILEGED_NAMESPACES.contains(&namespace) {
        CredentialKind::Admin
    } else {
        CredentialKind::Caller
    };

    let verb = if GET_EXCEPTIONS.contains(&method)
        || GET_PREFIXES.iter().any(|p| leaf.starts_with(p))
    {
        HttpVerb::Get
    } else {
        HttpVerb::Post
    };

    MethodClass { credential, verb }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_privileged_namespaces_take_the_admin_credential() {
        assert_eq!(classify("user.create").credential, CredentialKind::Admin);
        assert_eq!(classify("org.delete").credential, CredentialKind::Admin);
        assert_eq!(
            classify("admin.configureMonitoring").credential,
            CredentialKind::Admin
        );
    }

    #[test]
    fn test_ordinary_namespaces_keep_the_caller_credential() {
        assert_eq!(
            classify("system.bootstrap").credential,
            CredentialKind::Caller
        );
        assert_eq!(
            classify("channel.software.create").credential,
            CredentialKind::Caller
        );
    }

    #[test]
    fn test_read_prefixes_are_get() {
        assert_eq!(classify("user.listUsers").verb, HttpVerb::Get);
        assert_eq!(classify("system.getDetails").verb, HttpVerb::Get);
        assert_eq!(classify("channel.isUserSubscribable").verb, HttpVerb::Get);
        assert_eq!(classify("system.findByName").verb, HttpVerb::Get);
    }

    #[test]
    fn test_everything_else_is_post() {
        assert_eq!(classify("user.create").verb, HttpVerb::Post);
        assert_eq!(classify("system.scheduleReboot").verb, HttpVerb::Post);
        assert_eq!(classify("auth.login").verb, HttpVerb::Post);
    }

    #[test]
    fn test_explicit_get_exceptions() {
        assert_eq!(classify("api.systemVersion").verb, HttpVerb::Get);
        assert_eq!(classify("api.productName").verb, HttpVerb::Get);
    }

    #[test]
    fn test_classification_uses_the_namespace_not_a_substring() {
        // "userchannel" contains "user" but is not the user namespace
        assert_eq!(
            classify("userchannel.create").credential,
            CredentialKind::Caller
        );
    }
}
