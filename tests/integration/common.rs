//! Shared fixtures for the integration tests

use shelf_scout::config::{parse_config, Config};
use shelf_scout::harvest::StrategyRegistry;
use shelf_scout::storage::{shared, SharedStorage, SqliteStorage};
use shelf_scout::Orchestrator;

/// A listing page with `count` items linking to `/item/{prefix}-{i}`
pub fn listing_page(prefix: &str, count: usize) -> String {
    let items: String = (0..count)
        .map(|i| {
            format!(
                r#"<li class="item"><h3>Item {prefix}-{i}</h3><span class="price">$2{i}.50</span><a class="link" href="/item/{prefix}-{i}?utm_source=search">view</a></li>"#
            )
        })
        .collect();
    format!(
        "<html><head><title>Results</title></head><body><ul>{}</ul><footer>{}</footer></body></html>",
        items,
        "Prices shown include taxes. ".repeat(30)
    )
}

pub const CAPTCHA_PAGE: &str =
    "<html><body><h1>Robot Check</h1><p>Type the characters you see in this CAPTCHA</p></body></html>";

/// TOML for one source per name, all pointing at `base_url`
pub fn config_toml(base_url: &str, sources: &[&str], max_pages: u32, extra: &str) -> String {
    let mut toml = format!(
        r#"
[runner]
parallelism = 2
{extra}

[retry]
base-backoff-ms = 1
max-backoff-ms = 5

[governor]
jitter-ms = 0
max-delay-ms = 0

[fetch]
user-agent = "ShelfScoutTest/1.0"
timeout-secs = 5

[output]
database-path = ":memory:"
"#
    );

    for name in sources {
        toml.push_str(&format!(
            r#"
[[source]]
name = "{name}"
url-template = "{base_url}/{name}/search?q={{term}}&page={{page}}"
max-pages = {max_pages}
delay-floor-ms = 0
delay-ceiling-ms = 0
max-attempts = 2

[source.selectors]
container = "li.item"
name = "h3"
price = "span.price"
link = "a.link"
"#
        ));
    }
    toml
}

pub fn config(base_url: &str, sources: &[&str], max_pages: u32, extra: &str) -> Config {
    parse_config(&config_toml(base_url, sources, max_pages, extra)).unwrap()
}

pub fn orchestrator(config: Config) -> (Orchestrator, SharedStorage) {
    let storage = shared(SqliteStorage::new_in_memory().unwrap());
    let orch = Orchestrator::new(config, storage.clone(), StrategyRegistry::http_default()).unwrap();
    (orch, storage)
}

pub fn terms(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}
