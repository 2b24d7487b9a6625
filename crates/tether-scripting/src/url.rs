//! `URL` helper for scripts
//!
//! ```rhai
//! let url = URL(config["url"]);
//! url.searchParams.set("pageToken", "abc");
//! url.toString()
//! ```
//!
//! `searchParams` shares state with its URL, so edits through it are visible on the
//! URL without writing anything back.

use parking_lot::Mutex;
use rhai::{Dynamic, Engine, EvalAltResult, ImmutableString};
use std::fmt;
use std::sync::Arc;
use url::Url;

/// Parsed URL handle
#[derive(Clone)]
pub struct ScriptUrl {
    inner: Arc<Mutex<Url>>,
}

/// Query parameters of a [`ScriptUrl`]
#[derive(Clone)]
pub struct SearchParams {
    inner: Arc<Mutex<Url>>,
}

impl ScriptUrl {
    /// Parse an absolute URL
    pub fn parse(input: &str) -> Result<Self, Box<EvalAltResult>> {
        let url = Url::parse(input).map_err(|e| format!("invalid URL {input:?}: {e}"))?;
        Ok(Self {
            inner: Arc::new(Mutex::new(url)),
        })
    }

    /// Serialized URL
    pub fn href(&self) -> String {
        self.inner.lock().to_string()
    }

    fn search_params(&self) -> SearchParams {
        SearchParams {
            inner: Arc::clone(&self.inner),
        }
    }

    fn host(&self) -> String {
        let url = self.inner.lock();
        match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => String::new(),
        }
    }

    fn pathname(&self) -> String {
        self.inner.lock().path().to_string()
    }

    fn search(&self) -> String {
        match self.inner.lock().query() {
            Some(q) if !q.is_empty() => format!("?{q}"),
            _ => String::new(),
        }
    }
}

impl fmt::Debug for ScriptUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("URL").field(&self.href()).finish()
    }
}

impl fmt::Debug for SearchParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.pairs()).finish()
    }
}

impl SearchParams {
    fn pairs(&self) -> Vec<(String, String)> {
        self.inner
            .lock()
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    fn replace(&self, pairs: &[(String, String)]) {
        let mut url = self.inner.lock();
        if pairs.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut()
                .clear()
                .extend_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
    }

    /// Replace the first pair named `key`, drop any later ones, or append
    pub fn set(&self, key: &str, value: &str) {
        let mut pairs = self.pairs();
        match pairs.iter().position(|(k, _)| k == key) {
            Some(first) => {
                pairs[first].1 = value.to_string();
                let mut index = 0;
                pairs.retain(|(k, _)| {
                    let keep = k != key || index == first;
                    index += 1;
                    keep
                });
            }
            None => pairs.push((key.to_string(), value.to_string())),
        }
        self.replace(&pairs);
    }

    /// Append a pair, keeping existing ones
    pub fn append(&self, key: &str, value: &str) {
        let mut pairs = self.pairs();
        pairs.push((key.to_string(), value.to_string()));
        self.replace(&pairs);
    }

    /// First value for `key`
    pub fn get(&self, key: &str) -> Option<String> {
        self.pairs().into_iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Whether any pair is named `key`
    pub fn has(&self, key: &str) -> bool {
        self.pairs().iter().any(|(k, _)| k == key)
    }

    /// Remove every pair named `key`
    pub fn remove(&self, key: &str) {
        let mut pairs = self.pairs();
        pairs.retain(|(k, _)| k != key);
        self.replace(&pairs);
    }
}

fn text(value: &Dynamic) -> String {
    if value.is_string() {
        value.clone().into_string().unwrap_or_default()
    } else if value.is_unit() {
        String::new()
    } else {
        value.to_string()
    }
}

/// Register `URL(..)` and `searchParams`
pub(crate) fn install_url(engine: &mut Engine) {
    engine
        .register_type_with_name::<ScriptUrl>("URL")
        .register_fn("URL", |input: ImmutableString| ScriptUrl::parse(&input))
        .register_fn("toString", |u: &mut ScriptUrl| u.href())
        .register_fn("to_string", |u: &mut ScriptUrl| u.href())
        .register_get("href", |u: &mut ScriptUrl| u.href())
        .register_get("host", |u: &mut ScriptUrl| u.host())
        .register_get("pathname", |u: &mut ScriptUrl| u.pathname())
        .register_get("search", |u: &mut ScriptUrl| u.search())
        .register_get_set(
            "searchParams",
            |u: &mut ScriptUrl| u.search_params(),
            |u: &mut ScriptUrl, params: SearchParams| u.inner = params.inner,
        );

    engine
        .register_type_with_name::<SearchParams>("URLSearchParams")
        .register_fn("set", |p: &mut SearchParams, key: ImmutableString, value: Dynamic| {
            p.set(&key, &text(&value))
        })
        .register_fn(
            "append",
            |p: &mut SearchParams, key: ImmutableString, value: Dynamic| {
                p.append(&key, &text(&value))
            },
        )
        .register_fn("get", |p: &mut SearchParams, key: ImmutableString| {
            p.get(&key).map(Dynamic::from).unwrap_or(Dynamic::UNIT)
        })
        .register_fn("has", |p: &mut SearchParams, key: ImmutableString| {
            p.has(&key)
        })
        .register_fn("remove", |p: &mut SearchParams, key: ImmutableString| {
            p.remove(&key)
        })
        .register_fn("delete", |p: &mut SearchParams, key: ImmutableString| {
            p.remove(&key)
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> Engine {
        let mut engine = Engine::new();
        install_url(&mut engine);
        engine
    }

    #[test]
    fn test_set_appends_to_bare_url() {
        let href: String = engine()
            .eval(
                r#"
                let url = URL("http://example.com");
                url.searchParams.set("pageToken", "abc");
                url.searchParams.set("pageSize", 2);
                url.toString()
                "#,
            )
            .unwrap();
        assert_eq!(href, "http://example.com/?pageToken=abc&pageSize=2");
    }

    #[test]
    fn test_set_replaces_first_and_drops_duplicates() {
        let href: String = engine()
            .eval(
                r#"
                let url = URL("http://example.com/items?a=1&b=2&a=3");
                url.searchParams.set("a", "9");
                url.href
                "#,
            )
            .unwrap();
        assert_eq!(href, "http://example.com/items?a=9&b=2");
    }

    #[test]
    fn test_empty_value_is_kept() {
        let href: String = engine()
            .eval(
                r#"
                let url = URL("http://example.com");
                url.searchParams.set("syncToken", "");
                url.to_string()
                "#,
            )
            .unwrap();
        assert_eq!(href, "http://example.com/?syncToken=");
    }

    #[test]
    fn test_get_has_remove() {
        let engine = engine();
        let value: String = engine
            .eval(r#"URL("http://e.com/?x=1&x=2").searchParams.get("x")"#)
            .unwrap();
        assert_eq!(value, "1");

        let missing = engine
            .eval::<Dynamic>(r#"URL("http://e.com/").searchParams.get("x")"#)
            .unwrap();
        assert!(missing.is_unit());

        let search: String = engine
            .eval(
                r#"
                let url = URL("http://e.com/p?x=1&y=2");
                url.searchParams.remove("x");
                if url.searchParams.has("x") { "still there" } else { url.search }
                "#,
            )
            .unwrap();
        assert_eq!(search, "?y=2");
    }

    #[test]
    fn test_url_parts() {
        let engine = engine();
        let host: String = engine.eval(r#"URL("http://localhost:8082/a/b").host"#).unwrap();
        assert_eq!(host, "localhost:8082");
        let path: String = engine.eval(r#"URL("http://localhost:8082/a/b").pathname"#).unwrap();
        assert_eq!(path, "/a/b");
    }

    #[test]
    fn test_invalid_url_is_runtime_error() {
        let result = engine().eval::<ScriptUrl>(r#"URL("not a url")"#);
        assert!(result.is_err());
    }
}
