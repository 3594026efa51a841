use crabquery::{Document, Element};

/// A handle over a parsed HTML forest.
///
/// Backed by `crabquery`, which hands back owned `Element`s, so there is no
/// parent-tree borrow to thread through here -- a `Selector` is just a list
/// of roots.
pub struct Selector {
    roots: Vec<Element>,
}

impl Selector {
    /// Parses `html` into a single-root forest.
    pub fn parse(html: &str) -> Self {
        let document = Document::from(html.to_string());
        Selector {
            roots: document.select("html"),
        }
    }

    fn from_roots(roots: Vec<Element>) -> Self {
        Selector { roots }
    }

    /// Filters the forest via `css`, searching every current root.
    pub fn select(&self, css: &str) -> Selector {
        let mut matched = Vec::new();
        for root in &self.roots {
            matched.extend(root.select(css));
        }
        Selector::from_roots(matched)
    }

    /// `"text"` concatenates descendant text per root, whitespace-normalised.
    /// Any other string extracts that attribute; roots missing it contribute
    /// nothing, so the result can be shorter than `count()`.
    pub fn extract(&self, attr_or_text: &str) -> Vec<String> {
        if attr_or_text == "text" {
            self.roots
                .iter()
                .map(|el| normalize_whitespace(&el.text()))
                .collect()
        } else {
            self.roots
                .iter()
                .filter_map(|el| el.attr(attr_or_text))
                .collect()
        }
    }

    pub fn count(&self) -> usize {
        self.roots.len()
    }

    pub fn contains(&self, css: &str) -> bool {
        !self.select(css).roots.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}

/// Strips leading/trailing Unicode whitespace and collapses interior runs to
/// a single space.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl IntoIterator for Selector {
    type Item = Selector;
    type IntoIter = std::vec::IntoIter<Selector>;

    /// Each root yields its own singleton `Selector`.
    fn into_iter(self) -> Self::IntoIter {
        self.roots
            .into_iter()
            .map(|root| Selector::from_roots(vec![root]))
            .collect::<Vec<_>>()
            .into_iter()
    }
}
