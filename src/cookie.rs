//! Cookie jar carried between one response and the next request.
//!
//! The jar is not cumulative. Every response replaces it entirely with the
//! cookies from its `Set-Cookie` headers, and every request sends back exactly
//! what the last response set. There is no domain, path or expiry matching.

use std::collections::BTreeMap;

use http::header;
use http::HeaderMap;

/// A cookie as received, with the attributes echoed back to the server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cookie {
    /// Value exactly as received, quotes included.
    pub value: String,
    pub version: Option<String>,
    pub path: Option<String>,
    pub domain: Option<String>,
}

/// Name to cookie mapping owned by one transport.
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    cookies: BTreeMap<String, Cookie>,
}

// Attributes that belong to the preceding cookie rather than starting a new one.
const ATTRIBUTES: &[&str] = &[
    "expires", "path", "comment", "domain", "max-age", "secure", "httponly", "version",
    "samesite",
];

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn get(&self, name: &str) -> Option<&Cookie> {
        self.cookies.get(name)
    }

    pub fn clear(&mut self) {
        self.cookies.clear();
    }

    /// Replace the jar content with the `Set-Cookie` headers of a response.
    pub fn replace_from(&mut self, headers: Option<&HeaderMap>) {
        self.clear();

        let Some(headers) = headers else {
            return;
        };

        for value in headers.get_all(header::SET_COOKIE) {
            match value.to_str() {
                Ok(v) => self.load(v),
                Err(_) => debug!("Ignore non-ascii set-cookie: {:?}", value),
            }
        }
    }

    /// Parse one `Set-Cookie` value into the jar.
    ///
    /// A value may carry several cookies: any `name=value` pair that is not a
    /// known attribute starts a new cookie.
    pub fn load(&mut self, line: &str) {
        let mut current: Option<String> = None;

        for part in line.split(';') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }

            let (key, value) = match part.split_once('=') {
                Some((k, v)) => (k.trim(), v.trim()),
                None => (part, ""),
            };

            let lower = key.to_ascii_lowercase();
            let lower = lower.strip_prefix('$').unwrap_or(&lower);

            if ATTRIBUTES.contains(&lower) {
                let Some(cookie) = current.as_ref().and_then(|n| self.cookies.get_mut(n)) else {
                    continue;
                };
                match lower {
                    "path" => cookie.path = Some(value.to_string()),
                    "domain" => cookie.domain = Some(value.to_string()),
                    "version" => cookie.version = Some(value.to_string()),
                    // Not echoed back.
                    _ => {}
                }
            } else if !key.is_empty() && part.contains('=') {
                self.cookies.insert(
                    key.to_string(),
                    Cookie {
                        value: value.to_string(),
                        ..Default::default()
                    },
                );
                current = Some(key.to_string());
            }
        }
    }

    /// One `Cookie` request header value per cookie.
    ///
    /// `[$Version=v; ]name=value[; $Path=p][; $Domain=d]`
    pub fn request_headers(&self) -> impl Iterator<Item = String> + '_ {
        self.cookies.iter().map(|(name, c)| {
            let mut attrs = Vec::with_capacity(4);

            if let Some(v) = c.version.as_deref().filter(|v| !v.is_empty() && *v != "0") {
                attrs.push(format!("$Version={}", v));
            }
            attrs.push(format!("{}={}", name, c.value));
            if let Some(v) = c.path.as_deref().filter(|v| !v.is_empty()) {
                attrs.push(format!("$Path={}", v));
            }
            if let Some(v) = c.domain.as_deref().filter(|v| !v.is_empty()) {
                attrs.push(format!("$Domain={}", v));
            }

            attrs.join("; ")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn headers(set_cookies: &[&'static str]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for &v in set_cookies {
            map.append(header::SET_COOKIE, HeaderValue::from_static(v));
        }
        map
    }

    #[test]
    fn path_is_echoed() {
        let mut jar = CookieJar::new();
        jar.replace_from(Some(&headers(&["sid=123; Path=/"])));

        let v: Vec<_> = jar.request_headers().collect();
        assert_eq!(v, vec!["sid=123; $Path=/"]);
    }

    #[test]
    fn version_and_domain() {
        let mut jar = CookieJar::new();
        jar.load("a=1; Version=1; Domain=.x.test; Path=/p; HttpOnly");

        let v: Vec<_> = jar.request_headers().collect();
        assert_eq!(v, vec!["$Version=1; a=1; $Path=/p; $Domain=.x.test"]);
    }

    #[test]
    fn version_zero_is_omitted() {
        let mut jar = CookieJar::new();
        jar.load("a=1; Version=0");

        let v: Vec<_> = jar.request_headers().collect();
        assert_eq!(v, vec!["a=1"]);
    }

    #[test]
    fn expires_with_comma() {
        let mut jar = CookieJar::new();
        jar.load("sid=abc; Expires=Wed, 21 Oct 2015 07:28:00 GMT; Path=/");

        assert_eq!(jar.len(), 1);
        assert_eq!(jar.get("sid").unwrap().path.as_deref(), Some("/"));
    }

    #[test]
    fn several_cookies_in_one_header() {
        let mut jar = CookieJar::new();
        jar.load("a=1; Path=/a; b=\"two\"");

        assert_eq!(jar.get("a").unwrap().path.as_deref(), Some("/a"));
        assert_eq!(jar.get("b").unwrap().value, "\"two\"");
        assert_eq!(jar.get("b").unwrap().path, None);
    }

    #[test]
    fn replaced_not_merged() {
        let mut jar = CookieJar::new();
        jar.replace_from(Some(&headers(&["a=1", "b=2"])));
        assert_eq!(jar.len(), 2);

        jar.replace_from(Some(&headers(&["c=3"])));
        assert_eq!(jar.len(), 1);
        assert!(jar.get("a").is_none());

        jar.replace_from(None);
        assert!(jar.is_empty());
    }
}
