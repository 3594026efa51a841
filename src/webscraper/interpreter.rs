use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use regex::Regex;
use serde_json::{Map, Value};

use crate::error::Error;
use crate::http::HttpClient;
use crate::module::{ParseOutcome, Record, SpiderModule};
use crate::response::Response;
use crate::selector::Selector;
use crate::webscraper::rule::{Rule, RuleKind, Sitemap, ROOT_ID};

/// A `SpiderModule` that drives a declarative [`Sitemap`] tree: rules are
/// grouped by parent id, each level's siblings are combined by cross
/// product, and `SelectorLink` rules with children synchronously fetch and
/// recurse into the linked page.
pub struct WebScraperSpider {
    start_urls: Vec<String>,
    rules: Vec<Rule>,
}

impl WebScraperSpider {
    pub fn new(sitemap: Sitemap) -> Self {
        WebScraperSpider {
            start_urls: sitemap.start_url.into_vec(),
            rules: sitemap.selectors,
        }
    }

    /// Seeds an [`Options`](crate::options::Options) with this sitemap's
    /// `startUrl`s, so the Engine's DataTable registers the same seeds this
    /// module's default `start_requests` (seed url unchanged) will dispatch.
    pub fn seed_options(&self) -> crate::options::Options {
        crate::options::Options::new().with_urls(self.start_urls.clone())
    }

    fn children_of<'a>(&'a self, parent_id: &'a str) -> impl Iterator<Item = &'a Rule> + 'a {
        self.rules
            .iter()
            .filter(move |rule| rule.parents.iter().any(|p| p.as_str() == parent_id))
    }

    fn has_children(&self, rule_id: &str) -> bool {
        self.rules
            .iter()
            .any(|rule| rule.parents.iter().any(|p| p.as_str() == rule_id))
    }

    /// Evaluates every rule parented at `parent_id` against `scope`,
    /// cross-producting siblings in declaration order. An empty column
    /// leaves the running accumulation untouched, pruning only that column.
    fn eval_level<'a>(
        &'a self,
        parent_id: &'a str,
        scope: Selector,
        response: &'a Response,
        http: &'a Arc<dyn HttpClient>,
    ) -> BoxFuture<'a, Result<Vec<Record>, Error>> {
        async move {
            let mut accumulated: Vec<Record> = Vec::new();
            let mut has_accumulated = false;

            for rule in self.children_of(parent_id) {
                let column = self.eval_rule(rule, &scope, response, http).await?;
                accumulated = if has_accumulated {
                    combine(&accumulated, &column)
                } else {
                    column
                };
                has_accumulated = true;
            }

            Ok(accumulated)
        }
        .boxed()
    }

    async fn eval_rule(
        &self,
        rule: &Rule,
        scope: &Selector,
        response: &Response,
        http: &Arc<dyn HttpClient>,
    ) -> Result<Vec<Record>, Error> {
        let matched = scope.select(&rule.selector);

        if rule.kind == RuleKind::SelectorGroup {
            let values: Vec<Value> = matched
                .extract("text")
                .into_iter()
                .map(Value::String)
                .collect();
            let mut record = Map::new();
            record.insert(rule.id.clone(), Value::Array(values));
            return Ok(vec![Value::Object(record)]);
        }

        let nodes: Vec<Selector> = if rule.multiple {
            matched.into_iter().collect()
        } else {
            matched.into_iter().take(1).collect()
        };

        let mut column = Vec::with_capacity(nodes.len());

        for node in nodes {
            match rule.kind {
                RuleKind::SelectorText => {
                    let text = node.extract("text").into_iter().next().unwrap_or_default();
                    let text = apply_regex(&rule.regex, text);
                    column.push(single_field(&rule.id, Value::String(text)));
                }
                RuleKind::SelectorElementAttribute => {
                    let attr = rule.extract_attribute.as_deref().unwrap_or("text");
                    let value = node
                        .extract(attr)
                        .into_iter()
                        .next()
                        .map(Value::String)
                        .unwrap_or(Value::Null);
                    column.push(single_field(&rule.id, value));
                }
                RuleKind::SelectorElement => {
                    let child_records = self.eval_level(&rule.id, node, response, http).await?;
                    column.extend(child_records);
                }
                RuleKind::SelectorLink => {
                    let text = node.extract("text").into_iter().next().unwrap_or_default();
                    let href = node.extract("href").into_iter().next();

                    let mut own = Map::new();
                    own.insert(rule.id.clone(), Value::String(text));
                    own.insert(
                        format!("{}-href", rule.id),
                        href.as_deref()
                            .map(|h| Value::String(response.url_join(h)))
                            .unwrap_or(Value::Null),
                    );
                    let own_record = vec![Value::Object(own)];

                    let href = match href {
                        Some(h) if self.has_children(&rule.id) => h,
                        _ => {
                            column.extend(own_record);
                            continue;
                        }
                    };

                    let joined = response.url_join(&href);
                    let raw = http.get(&joined).await?;
                    if raw.status != 200 {
                        column.extend(own_record);
                        continue;
                    }

                    let sub_response = Response::new(raw.url, raw.body);
                    let sub_scope = Selector::parse(&sub_response.body);
                    let child_records = self
                        .eval_level(&rule.id, sub_scope, &sub_response, http)
                        .await?;
                    column.extend(combine(&own_record, &child_records));
                }
                RuleKind::SelectorGroup => unreachable!("handled before the node loop"),
            }
        }

        Ok(column)
    }
}

fn single_field(id: &str, value: Value) -> Record {
    let mut record = Map::new();
    record.insert(id.to_string(), value);
    Value::Object(record)
}

/// `combine([], R) = R`, `combine(L, []) = L`; otherwise the pairwise
/// left-join cross product `{l merged with r | l in L, r in R}`.
fn combine(left: &[Record], right: &[Record]) -> Vec<Record> {
    if left.is_empty() {
        return right.to_vec();
    }
    if right.is_empty() {
        return left.to_vec();
    }

    let mut out = Vec::with_capacity(left.len() * right.len());
    for l in left {
        for r in right {
            out.push(merge_objects(l, r));
        }
    }
    out
}

fn merge_objects(a: &Record, b: &Record) -> Record {
    let mut merged = a.as_object().cloned().unwrap_or_default();
    if let Some(b_obj) = b.as_object() {
        for (k, v) in b_obj {
            merged.insert(k.clone(), v.clone());
        }
    }
    Value::Object(merged)
}

/// If `pattern` compiles and captures a first group in `text`, returns that
/// group; otherwise returns `text` unchanged.
fn apply_regex(pattern: &Option<String>, text: String) -> String {
    let pattern = match pattern {
        Some(p) if !p.is_empty() => p,
        _ => return text,
    };

    match Regex::new(pattern) {
        Ok(re) => match re.captures(&text) {
            Some(caps) => caps
                .get(1)
                .map(|m| m.as_str().to_string())
                .unwrap_or(text),
            None => text,
        },
        Err(_) => text,
    }
}

#[async_trait]
impl SpiderModule for WebScraperSpider {
    type State = ();

    async fn parse(
        &self,
        response: Response,
        _state: Arc<Self::State>,
        http: Arc<dyn HttpClient>,
    ) -> Result<ParseOutcome, Error> {
        let scope = Selector::parse(&response.body);
        let records = self.eval_level(ROOT_ID, scope, &response, &http).await?;
        Ok(ParseOutcome::data(records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubHttpClient;
    use serde_json::json;

    fn rule(id: &str, kind: RuleKind, selector: &str, multiple: bool, parents: &[&str]) -> Rule {
        Rule {
            id: id.to_string(),
            selector: selector.to_string(),
            kind,
            multiple,
            parents: parents.iter().map(|s| s.to_string()).collect(),
            extract_attribute: None,
            regex: None,
        }
    }

    const LISTING_HTML: &str = r#"
        <html><body>
            <a class="category-link" href="/computers">Computers</a>
            <a class="category-link" href="/phones">Phones</a>
            <h1 class="jumbotron-title">E-commerce training site</h1>
        </body></html>
    "#;

    #[async_std::test]
    async fn single_vs_multiple_cross_product() {
        let http: Arc<dyn HttpClient> =
            Arc::new(StubHttpClient::new().with_page("https://shop/", LISTING_HTML));

        let rules = vec![
            rule(
                "Category",
                RuleKind::SelectorText,
                "a.category-link",
                true,
                &["_root"],
            ),
            rule(
                "Page Title",
                RuleKind::SelectorText,
                ".jumbotron-title",
                false,
                &["_root"],
            ),
        ];

        let spider = WebScraperSpider::new(Sitemap {
            start_url: crate::webscraper::rule::StartUrl::Single("https://shop/".into()),
            selectors: rules,
        });

        let response = Response::new("https://shop/", LISTING_HTML);
        let records = spider
            .eval_level(ROOT_ID, Selector::parse(LISTING_HTML), &response, &http)
            .await
            .unwrap();

        assert_eq!(
            records,
            vec![
                json!({"Category": "Computers", "Page Title": "E-commerce training site"}),
                json!({"Category": "Phones", "Page Title": "E-commerce training site"}),
            ]
        );
    }

    #[async_std::test]
    async fn link_follow_produces_one_row_per_child() {
        let computers_page = r#"
            <html><body>
                <a class="subcategory-link" href="/computers/laptops">Laptops</a>
                <a class="subcategory-link" href="/computers/tablets">Tablets</a>
            </body></html>
        "#;

        let http: Arc<dyn HttpClient> = Arc::new(
            StubHttpClient::new()
                .with_page("https://shop/", LISTING_HTML)
                .with_page("https://shop/computers", computers_page),
        );

        let rules = vec![
            rule(
                "Category",
                RuleKind::SelectorLink,
                "a.category-link",
                true,
                &["_root"],
            ),
            rule(
                "SubCategory",
                RuleKind::SelectorText,
                "a.subcategory-link",
                true,
                &["Category"],
            ),
        ];

        let spider = WebScraperSpider::new(Sitemap {
            start_url: crate::webscraper::rule::StartUrl::Single("https://shop/".into()),
            selectors: rules,
        });

        let response = Response::new("https://shop/", LISTING_HTML);
        let records = spider
            .eval_level(ROOT_ID, Selector::parse(LISTING_HTML), &response, &http)
            .await
            .unwrap();

        // Only the "Computers" link has a stubbed child page; "Phones" has
        // none, so its column collapses to zero rows (missing sub-selector
        // prunes only that column).
        assert_eq!(records.len(), 2);
        for record in &records {
            assert_eq!(record["Category"], json!("Computers"));
        }
        let sub_categories: Vec<&str> = records
            .iter()
            .map(|r| r["SubCategory"].as_str().unwrap())
            .collect();
        assert_eq!(sub_categories, vec!["Laptops", "Tablets"]);
    }

    #[async_std::test]
    async fn selector_group_emits_single_list_valued_record() {
        let http: Arc<dyn HttpClient> =
            Arc::new(StubHttpClient::new().with_page("https://shop/", LISTING_HTML));

        let rules = vec![rule(
            "AllCategories",
            RuleKind::SelectorGroup,
            "a.category-link",
            true,
            &["_root"],
        )];

        let spider = WebScraperSpider::new(Sitemap {
            start_url: crate::webscraper::rule::StartUrl::Single("https://shop/".into()),
            selectors: rules,
        });

        let response = Response::new("https://shop/", LISTING_HTML);
        let records = spider
            .eval_level(ROOT_ID, Selector::parse(LISTING_HTML), &response, &http)
            .await
            .unwrap();

        assert_eq!(
            records,
            vec![json!({"AllCategories": ["Computers", "Phones"]})]
        );
    }

    #[test]
    fn combine_is_identity_on_empty_sides() {
        let l = vec![json!({"a": 1})];
        assert_eq!(combine(&l, &[]), l);
        assert_eq!(combine(&[], &l), l);
    }
}
