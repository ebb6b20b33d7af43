//! Route classification for the request gate.
//!
//! Classification is a pure function of the request path: the table is a
//! list of `(prefix, class)` rules and the longest matching prefix decides.
//! Payment routes are listed like any other rule, so a payment prefix nested
//! inside a protected prefix (`/dashboard/billing`) carves itself out by being
//! longer.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

/// The path as the file server resolves it: percent-decoded, with empty and
/// `.` segments dropped and `..` applied.
pub fn normalize_path(raw: &str) -> String {
    let decoded = urlencoding::decode_binary(raw.as_bytes());
    let decoded: Cow<'_, str> = String::from_utf8_lossy(&decoded);

    let mut segments: Vec<&str> = Vec::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    let mut normalized = format!("/{}", segments.join("/"));
    if decoded.ends_with('/') && !segments.is_empty() {
        normalized.push('/');
    }
    normalized
}

/// Policy class of a request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteClass {
    /// Requires a signed-in, paying (or exempt, or admin) user.
    Protected,
    /// Requires a signed-in admin.
    Admin,
    /// Sign-in/sign-up pages; signed-in users are sent to the dashboard.
    Auth,
    /// Subscription and payment pages; reachable in any state.
    Payment,
    Public,
}

impl RouteClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteClass::Protected => "protected",
            RouteClass::Admin => "admin",
            RouteClass::Auth => "auth",
            RouteClass::Payment => "payment",
            RouteClass::Public => "public",
        }
    }
}

impl fmt::Display for RouteClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RouteClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "protected" => Ok(RouteClass::Protected),
            "admin" => Ok(RouteClass::Admin),
            "auth" => Ok(RouteClass::Auth),
            "payment" => Ok(RouteClass::Payment),
            "public" => Ok(RouteClass::Public),
            other => Err(format!("Unknown route class '{}'", other)),
        }
    }
}

/// Ordered prefix rules plus the paths that bypass the gate entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTable {
    rules: Vec<(String, RouteClass)>,
    excluded_prefixes: Vec<String>,
    excluded_extensions: Vec<String>,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new(vec![
            ("/dashboard".to_string(), RouteClass::Protected),
            ("/profile".to_string(), RouteClass::Protected),
            ("/admin".to_string(), RouteClass::Admin),
            ("/auth/signin".to_string(), RouteClass::Auth),
            ("/auth/signup".to_string(), RouteClass::Auth),
            ("/auth/subscription".to_string(), RouteClass::Payment),
            ("/auth/payment".to_string(), RouteClass::Payment),
        ])
    }
}

impl RouteTable {
    /// Build a table from explicit rules with the default exclusions.
    pub fn new(rules: Vec<(String, RouteClass)>) -> Self {
        Self {
            rules,
            excluded_prefixes: ["/_next/static", "/_next/image", "/static/", "/favicon.ico"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            excluded_extensions: ["svg", "png", "jpg", "jpeg", "gif", "webp", "ico"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    /// Parse `prefix=class` pairs separated by commas, e.g.
    /// `/dashboard=protected,/admin=admin,/auth/payment=payment`.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let mut rules = Vec::new();
        for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (prefix, class) = entry
                .split_once('=')
                .ok_or_else(|| format!("Route rule '{}' is not of the form prefix=class", entry))?;
            let prefix = prefix.trim();
            if !prefix.starts_with('/') {
                return Err(format!("Route prefix '{}' must start with '/'", prefix));
            }
            rules.push((prefix.to_string(), class.parse()?));
        }

        if rules.is_empty() {
            return Err("Route table must contain at least one rule".to_string());
        }

        Ok(Self::new(rules))
    }

    pub fn rules(&self) -> &[(String, RouteClass)] {
        &self.rules
    }

    /// Longest matching prefix wins; equal lengths keep the first listed rule.
    /// Matching runs on the normalized path.
    pub fn classify(&self, path: &str) -> RouteClass {
        let path = normalize_path(path);
        let mut best: Option<(usize, RouteClass)> = None;
        for (prefix, class) in &self.rules {
            if path.starts_with(prefix.as_str())
                && best.is_none_or(|(len, _)| prefix.len() > len)
            {
                best = Some((prefix.len(), *class));
            }
        }
        best.map(|(_, class)| class).unwrap_or(RouteClass::Public)
    }

    /// Static assets, image optimizer output, favicon and image files are
    /// never gated.
    pub fn is_excluded(&self, path: &str) -> bool {
        let path = normalize_path(path);
        if self
            .excluded_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
        {
            return true;
        }

        let last_segment = path.rsplit('/').next().unwrap_or_default();
        match last_segment.rsplit_once('.') {
            Some((_, ext)) => self
                .excluded_extensions
                .iter()
                .any(|e| e.eq_ignore_ascii_case(ext)),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_classifies_known_prefixes() {
        let table = RouteTable::default();
        assert_eq!(table.classify("/dashboard"), RouteClass::Protected);
        assert_eq!(table.classify("/dashboard/projects/1"), RouteClass::Protected);
        assert_eq!(table.classify("/profile"), RouteClass::Protected);
        assert_eq!(table.classify("/admin/requests"), RouteClass::Admin);
        assert_eq!(table.classify("/auth/signin"), RouteClass::Auth);
        assert_eq!(table.classify("/auth/signup"), RouteClass::Auth);
        assert_eq!(table.classify("/auth/subscription"), RouteClass::Payment);
        assert_eq!(table.classify("/auth/payment/confirm"), RouteClass::Payment);
        assert_eq!(table.classify("/"), RouteClass::Public);
        assert_eq!(table.classify("/pricing"), RouteClass::Public);
        assert_eq!(table.classify("/auth/callback"), RouteClass::Public);
    }

    #[test]
    fn prefix_match_is_plain_string_prefix() {
        let table = RouteTable::default();
        assert_eq!(table.classify("/dashboards"), RouteClass::Protected);
        assert_eq!(table.classify("/administrator"), RouteClass::Admin);
    }

    #[test]
    fn longest_prefix_carves_payment_out_of_protected() {
        let table = RouteTable::new(vec![
            ("/dashboard".to_string(), RouteClass::Protected),
            ("/dashboard/billing".to_string(), RouteClass::Payment),
        ]);
        assert_eq!(table.classify("/dashboard/billing/plans"), RouteClass::Payment);
        assert_eq!(table.classify("/dashboard/projects"), RouteClass::Protected);
    }

    #[test]
    fn classification_is_stable() {
        let table = RouteTable::default();
        for path in ["/dashboard", "/admin", "/auth/signin", "/x"] {
            assert_eq!(table.classify(path), table.classify(path));
        }
    }

    #[test]
    fn excludes_assets_and_images() {
        let table = RouteTable::default();
        assert!(table.is_excluded("/_next/static/chunks/main.js"));
        assert!(table.is_excluded("/_next/image"));
        assert!(table.is_excluded("/favicon.ico"));
        assert!(table.is_excluded("/static/app.css"));
        assert!(table.is_excluded("/dashboard/logo.PNG"));
        assert!(table.is_excluded("/images/hero.webp"));
        assert!(!table.is_excluded("/dashboard"));
        assert!(!table.is_excluded("/dashboard/report.pdf"));
        assert!(!table.is_excluded("/api/access-requests"));
    }

    #[test]
    fn normalizes_encoded_and_dotted_paths() {
        assert_eq!(normalize_path("//dashboard/"), "/dashboard/");
        assert_eq!(normalize_path("/%64ashboard/"), "/dashboard/");
        assert_eq!(normalize_path("/%61dmin"), "/admin");
        assert_eq!(normalize_path("/static/../admin/./users"), "/admin/users");
        assert_eq!(normalize_path("/dashboard%2Findex.html"), "/dashboard/index.html");
        assert_eq!(normalize_path("/../../"), "/");
        assert_eq!(normalize_path("/"), "/");
    }

    #[test]
    fn non_canonical_paths_keep_their_class() {
        let table = RouteTable::default();
        assert_eq!(table.classify("//dashboard/"), RouteClass::Protected);
        assert_eq!(table.classify("/%61dmin/"), RouteClass::Admin);
        assert_eq!(table.classify("/pricing/../admin"), RouteClass::Admin);
        assert!(!table.is_excluded("/static/../dashboard/"));
        assert!(!table.is_excluded("/_next/static/%2e%2e/%2e%2e/admin/"));
    }

    #[test]
    fn parses_rule_overrides() {
        let table = RouteTable::parse("/app=protected, /ops=admin,/login=auth").unwrap();
        assert_eq!(table.rules().len(), 3);
        assert_eq!(table.classify("/app/home"), RouteClass::Protected);
        assert_eq!(table.classify("/ops"), RouteClass::Admin);
        assert_eq!(table.classify("/login"), RouteClass::Auth);
        assert_eq!(table.classify("/dashboard"), RouteClass::Public);
    }

    #[test]
    fn rejects_malformed_rules() {
        assert!(RouteTable::parse("").is_err());
        assert!(RouteTable::parse("/app").is_err());
        assert!(RouteTable::parse("app=protected").is_err());
        assert!(RouteTable::parse("/app=vip").is_err());
    }
}
