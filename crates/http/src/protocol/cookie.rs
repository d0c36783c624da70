//! HTTP cookies, as read from `Cookie` request headers and written as `Set-Cookie`.

use std::fmt;

/// A single cookie.
///
/// Request cookies only carry a name and a value; the remaining attributes are
/// used when the cookie is rendered into a `Set-Cookie` response header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    name: String,
    value: String,
    expires: Option<String>,
    domain: Option<String>,
    path: Option<String>,
    max_age: Option<i64>,
    secure: bool,
    http_only: bool,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            expires: None,
            domain: None,
            path: None,
            max_age: None,
            secure: false,
            http_only: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn expires(&self) -> Option<&str> {
        self.expires.as_deref()
    }

    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn max_age(&self) -> Option<i64> {
        self.max_age
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    pub fn is_http_only(&self) -> bool {
        self.http_only
    }

    /// Sets the `Expires` attribute, an HTTP date string.
    #[must_use]
    pub fn with_expires(mut self, expires: impl Into<String>) -> Self {
        self.expires = Some(expires.into());
        self
    }

    #[must_use]
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_max_age(mut self, seconds: i64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    #[must_use]
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    #[must_use]
    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    /// A cookie that tells the client to drop `name` right away.
    pub fn expired(name: impl Into<String>) -> Self {
        Self::new(name, "").with_max_age(0).with_expires("Thu, 01 Jan 1970 00:00:00 GMT")
    }
}

/// Renders the cookie as a `Set-Cookie` header value.
impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)?;
        if let Some(path) = &self.path {
            write!(f, "; Path={path}")?;
        }
        if let Some(domain) = &self.domain {
            write!(f, "; Domain={domain}")?;
        }
        if let Some(max_age) = self.max_age {
            write!(f, "; Max-Age={max_age}")?;
        }
        if let Some(expires) = &self.expires {
            write!(f, "; Expires={expires}")?;
        }
        if self.secure {
            f.write_str("; Secure")?;
        }
        if self.http_only {
            f.write_str("; HttpOnly")?;
        }
        Ok(())
    }
}

/// Parses the value of a `Cookie` request header, e.g. `a=1; b="two"`.
///
/// Pairs without `=` or with an empty name are skipped; surrounding double quotes
/// are stripped from values.
pub fn parse_cookie_header(value: &str) -> Vec<Cookie> {
    value
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            let value = value.trim();
            let value = value.strip_prefix('"').and_then(|v| v.strip_suffix('"')).unwrap_or(value);
            Some(Cookie::new(name, value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_header() {
        let cookies = parse_cookie_header("session=abc123; theme=\"dark\";  ; broken; =nameless");
        assert_eq!(cookies, vec![Cookie::new("session", "abc123"), Cookie::new("theme", "dark")]);
    }

    #[test]
    fn render_set_cookie() {
        let cookie = Cookie::new("id", "42").with_path("/").with_max_age(60).with_secure(true).with_http_only(true);
        assert_eq!(cookie.to_string(), "id=42; Path=/; Max-Age=60; Secure; HttpOnly");
    }

    #[test]
    fn expired_cookie() {
        let cookie = Cookie::expired("id");
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(0));
        assert_eq!(cookie.to_string(), "id=; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT");
    }
}
