//! Ordered query-string multi-map.

use std::fmt;

/// Query parameters in insertion order. Keys may repeat.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Parse a form-urlencoded query string. A leading `?` is ignored.
    pub fn parse(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        Self(
            url::form_urlencoded::parse(query.as_bytes())
                .into_owned()
                .collect(),
        )
    }

    pub fn from_url(url: &url::Url) -> Self {
        Self(url.query_pairs().into_owned().collect())
    }

    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    /// Append every pair of `other`, keeping existing pairs.
    pub fn extend(&mut self, other: &QueryParams) {
        self.0.extend(other.0.iter().cloned());
    }

    /// First value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Last value for `name`, as MediaWiki reads repeated parameters.
    pub fn last(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .iter()
            .filter(move |(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Remove every pair named `name`, returning the first removed value.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let first = self.get(name).map(str::to_owned);
        self.0.retain(|(key, _)| key != name);
        first
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|(key, _)| key == name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(key, _)| key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Append all pairs onto the query of `url`.
    pub fn append_to(&self, url: &mut url::Url) {
        if self.is_empty() {
            return;
        }
        let mut pairs = url.query_pairs_mut();
        for (name, value) in &self.0 {
            pairs.append_pair(name, value);
        }
    }
}

impl fmt::Display for QueryParams {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let encoded = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.0.iter())
            .finish();
        f.write_str(&encoded)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keeps_order_and_repeats() {
        let query = QueryParams::parse("?a=1&b=two+words&a=3");
        assert_eq!(query.len(), 3);
        assert_eq!(query.get("a"), Some("1"));
        assert_eq!(query.last("a"), Some("3"));
        assert_eq!(query.get_all("a").collect::<Vec<_>>(), vec!["1", "3"]);
        assert_eq!(query.get("b"), Some("two words"));
        assert_eq!(query.keys().collect::<Vec<_>>(), vec!["a", "b", "a"]);
    }

    #[test]
    fn test_remove_drops_every_occurrence() {
        let mut query = QueryParams::parse("title=Foo&x=1&title=Bar");
        assert_eq!(query.remove("title").as_deref(), Some("Foo"));
        assert!(!query.contains("title"));
        assert_eq!(query.to_string(), "x=1");
        assert_eq!(query.remove("missing"), None);
    }

    #[test]
    fn test_display_encodes() {
        let query: QueryParams = [("search", "a b&c"), ("fulltext", "1")].into_iter().collect();
        assert_eq!(query.to_string(), "search=a+b%26c&fulltext=1");
    }

    #[test]
    fn test_append_to_url() {
        let mut url = url::Url::parse("https://example.org/wiki/Foo?action=view").unwrap();
        let mut query = QueryParams::parse("oldid=5");
        query.append("uselang", "de");
        query.append_to(&mut url);
        assert_eq!(url.as_str(), "https://example.org/wiki/Foo?action=view&oldid=5&uselang=de");
    }
}
