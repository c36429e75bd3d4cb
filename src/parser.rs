//! Pull the raw token out of an HTTP request.

use http::header::{HeaderName, AUTHORIZATION, COOKIE};
use http::request::Parts;

/// One place a token may be carried in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenLocation {
    /// `<header>: <prefix> <token>`; the prefix is matched case-insensitively.
    Header { name: HeaderName, prefix: String },
    /// `?<key>=<token>`
    Query { key: String },
    /// `Cookie: <name>=<token>`
    Cookie { name: String },
}

impl TokenLocation {
    fn extract(&self, parts: &Parts) -> Option<String> {
        match self {
            TokenLocation::Header { name, prefix } => {
                let value = parts.headers.get(name)?.to_str().ok()?;
                from_auth_header(value, prefix)
            }
            TokenLocation::Query { key } => {
                let query = parts.uri.query()?;
                url::form_urlencoded::parse(query.as_bytes())
                    .find(|(k, _)| k == key)
                    .map(|(_, v)| v.into_owned())
            }
            TokenLocation::Cookie { name } => parts
                .headers
                .get_all(COOKIE)
                .iter()
                .filter_map(|h| h.to_str().ok())
                .flat_map(|h| h.split(';'))
                .filter_map(|pair| pair.trim().split_once('='))
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.to_owned()),
        }
    }
}

// Supports several comma-separated schemes, e.g. "Basic abc, Bearer xyz".
fn from_auth_header(value: &str, prefix: &str) -> Option<String> {
    value.split(',').find_map(|part| {
        let part = part.trim();
        let (scheme, token) = part.split_once(' ')?;
        if !scheme.eq_ignore_ascii_case(prefix) {
            return None;
        }
        let token = token.trim();
        (!token.is_empty()).then(|| token.to_owned())
    })
}

/// Ordered chain of [`TokenLocation`]s; the first hit wins.
///
/// Register one as an axum extension to override the default chain used by
/// the extractors in [`middleware`](crate::middleware).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenParser {
    chain: Vec<TokenLocation>,
}

impl Default for TokenParser {
    /// `Authorization: Bearer`, then `?token=`, then the `token` cookie.
    fn default() -> Self {
        Self::new([
            TokenLocation::Header {
                name: AUTHORIZATION,
                prefix: "bearer".into(),
            },
            TokenLocation::Query {
                key: "token".into(),
            },
            TokenLocation::Cookie {
                name: "token".into(),
            },
        ])
    }
}

impl TokenParser {
    pub fn new(chain: impl IntoIterator<Item = TokenLocation>) -> Self {
        Self {
            chain: chain.into_iter().collect(),
        }
    }

    pub fn chain(&self) -> &[TokenLocation] {
        &self.chain
    }

    pub fn parse(&self, parts: &Parts) -> Option<String> {
        self.chain.iter().find_map(|location| location.extract(parts))
    }

    pub fn has_token(&self, parts: &Parts) -> bool {
        self.parse(parts).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Request;

    fn parts(builder: http::request::Builder) -> Parts {
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn bearer_header() {
        let p = parts(Request::builder().header("Authorization", "Bearer abc.def.ghi"));
        assert_eq!(TokenParser::default().parse(&p).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn prefix_is_case_insensitive_and_schemes_may_be_listed() {
        let p = parts(Request::builder().header("Authorization", "Basic Zm9v, bearer tok"));
        assert_eq!(TokenParser::default().parse(&p).as_deref(), Some("tok"));
    }

    #[test]
    fn other_scheme_is_ignored() {
        let p = parts(Request::builder().header("Authorization", "Basic Zm9v"));
        assert!(!TokenParser::default().has_token(&p));
        let p = parts(Request::builder().header("Authorization", "Bearer "));
        assert!(!TokenParser::default().has_token(&p));
    }

    #[test]
    fn query_string_is_decoded() {
        let p = parts(Request::builder().uri("/me?page=2&token=a%2Eb.c"));
        assert_eq!(TokenParser::default().parse(&p).as_deref(), Some("a.b.c"));
    }

    #[test]
    fn cookie() {
        let p = parts(Request::builder().header("Cookie", "theme=dark; token=xyz"));
        assert_eq!(TokenParser::default().parse(&p).as_deref(), Some("xyz"));
    }

    #[test]
    fn header_wins_over_query() {
        let p = parts(
            Request::builder()
                .uri("/me?token=from-query")
                .header("Authorization", "Bearer from-header"),
        );
        assert_eq!(TokenParser::default().parse(&p).as_deref(), Some("from-header"));
    }

    #[test]
    fn custom_chain() {
        let parser = TokenParser::new([TokenLocation::Header {
            name: HeaderName::from_static("x-api-token"),
            prefix: "token".into(),
        }]);
        let p = parts(
            Request::builder()
                .uri("/me?token=ignored")
                .header("X-Api-Token", "Token t1"),
        );
        assert_eq!(parser.parse(&p).as_deref(), Some("t1"));
        assert_eq!(parser.chain().len(), 1);
    }

    #[test]
    fn nothing_found() {
        let p = parts(Request::builder().uri("/me"));
        assert_eq!(TokenParser::default().parse(&p), None);
    }
}
