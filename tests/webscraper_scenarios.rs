//! Drives `WebScraperSpider` end-to-end through a real `Engine`, exercising
//! both the sitemap interpreter and the Engine's seed/export wiring together.

use std::sync::Arc;
use std::time::Duration;

use scrapex_engine::testing::StubHttpClient;
use scrapex_engine::webscraper::{Rule, RuleKind, Sitemap, StartUrl, WebScraperSpider};
use scrapex_engine::{Engine, ExportData, ExportFormat, HttpClient};
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
        <h1 class="jumbotron">E-commerce training site</h1>
    </body></html>
"#;

#[async_std::test]
async fn single_vs_multiple_selectors_cross_product_through_engine() {
    let http: Arc<dyn HttpClient> =
        Arc::new(StubHttpClient::new().with_page("https://shop/", LISTING_HTML));

    let sitemap = Sitemap {
        start_url: StartUrl::Single("https://shop/".into()),
        selectors: vec![
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
                ".jumbotron",
                false,
                &["_root"],
            ),
        ],
    };

    let spider = WebScraperSpider::new(sitemap);
    let opts = spider.seed_options();
    let engine = Engine::start_with_http(spider, opts, http)
        .await
        .unwrap()
        .expect("module did not decline to start");

    async_std::task::sleep(Duration::from_millis(40)).await;

    match engine.export(ExportFormat::Raw, false).await.unwrap() {
        ExportData::Raw(records) => {
            assert_eq!(
                records,
                vec![
                    json!({"Category": "Computers", "Page Title": "E-commerce training site"}),
                    json!({"Category": "Phones", "Page Title": "E-commerce training site"}),
                ]
            );
        }
        other => panic!("expected Raw, got {:?}", other),
    }
}

#[async_std::test]
async fn link_follow_child_grouping_through_engine() {
    let computers_page = r#"
        <html><body>
            <a class="subcategory-link" href="/computers/laptops">Laptops</a>
            <a class="subcategory-link" href="/computers/tablets">Tablets</a>
        </body></html>
    "#;
    let phones_page = r#"
        <html><body>
            <a class="subcategory-link" href="/phones/smartphones">Smartphones</a>
        </body></html>
    "#;

    let http: Arc<dyn HttpClient> = Arc::new(
        StubHttpClient::new()
            .with_page("https://shop/", LISTING_HTML)
            .with_page("https://shop/computers", computers_page)
            .with_page("https://shop/phones", phones_page),
    );

    let sitemap = Sitemap {
        start_url: StartUrl::Single("https://shop/".into()),
        selectors: vec![
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
        ],
    };

    let spider = WebScraperSpider::new(sitemap);
    let opts = spider.seed_options();
    let engine = Engine::start_with_http(spider, opts, http)
        .await
        .unwrap()
        .expect("module did not decline to start");

    async_std::task::sleep(Duration::from_millis(40)).await;

    match engine.export(ExportFormat::Raw, false).await.unwrap() {
        ExportData::Raw(records) => {
            // One record per (Category, SubCategory) pair.
            assert_eq!(records.len(), 3);
            let pairs: Vec<(String, String)> = records
                .iter()
                .map(|r| {
                    (
                        r["Category"].as_str().unwrap().to_string(),
                        r["SubCategory"].as_str().unwrap().to_string(),
                    )
                })
                .collect();
            assert!(pairs.contains(&("Computers".to_string(), "Laptops".to_string())));
            assert!(pairs.contains(&("Computers".to_string(), "Tablets".to_string())));
            assert!(pairs.contains(&("Phones".to_string(), "Smartphones".to_string())));
        }
        other => panic!("expected Raw, got {:?}", other),
    }
}
