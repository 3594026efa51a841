use serde::Deserialize;

/// Pseudo-parent id every top-level rule's `parents` list is rooted at.
pub const ROOT_ID: &str = "_root";

/// `startUrl` accepts either a bare string or an array, both seen in the
/// wild.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StartUrl {
    Single(String),
    Many(Vec<String>),
}

impl StartUrl {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            StartUrl::Single(url) => vec![url],
            StartUrl::Many(urls) => urls,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Sitemap {
    #[serde(rename = "startUrl")]
    pub start_url: StartUrl,
    pub selectors: Vec<Rule>,
}

/// Closed set of rule kinds. An unknown `type` tag is a hard parse error --
/// a silently-dropped rule would corrupt the cross-product at its level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum RuleKind {
    SelectorText,
    SelectorLink,
    SelectorElement,
    SelectorElementAttribute,
    SelectorGroup,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Rule {
    pub id: String,
    pub selector: String,
    #[serde(rename = "type")]
    pub kind: RuleKind,
    #[serde(default)]
    pub multiple: bool,
    pub parents: Vec<String>,
    #[serde(rename = "extractAttribute", default)]
    pub extract_attribute: Option<String>,
    #[serde(default)]
    pub regex: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_start_url_and_rules() {
        let json = r#"{
            "startUrl": "https://example.com",
            "selectors": [
                {"id": "Category", "type": "SelectorLink", "selector": "a.category-link",
                 "multiple": true, "parents": ["_root"]}
            ]
        }"#;

        let sitemap: Sitemap = serde_json::from_str(json).unwrap();
        assert_eq!(sitemap.start_url.into_vec(), vec!["https://example.com"]);
        assert_eq!(sitemap.selectors.len(), 1);
        assert_eq!(sitemap.selectors[0].kind, RuleKind::SelectorLink);
        assert!(sitemap.selectors[0].multiple);
    }

    #[test]
    fn parses_array_start_url() {
        let json = r#"{"startUrl": ["https://a", "https://b"], "selectors": []}"#;
        let sitemap: Sitemap = serde_json::from_str(json).unwrap();
        assert_eq!(sitemap.start_url.into_vec(), vec!["https://a", "https://b"]);
    }

    #[test]
    fn unknown_rule_kind_is_a_parse_error() {
        let json = r#"{
            "startUrl": "https://example.com",
            "selectors": [
                {"id": "X", "type": "SelectorXPath", "selector": "//a", "parents": ["_root"]}
            ]
        }"#;

        let result: Result<Sitemap, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }
}
