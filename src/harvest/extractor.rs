//! Listing extraction
//!
//! This module turns a fetched listing page into raw records:
//! - One raw record per element matching the container selector
//! - Field values read from text, or from an attribute where configured
//! - Each field tries its selectors in order and keeps the first non-empty value
//! - No validation; missing fields stay `None` for the record builder to judge

use crate::config::{SelectorConfig, SelectorList};
use crate::harvest::target::Target;
use crate::ConfigError;
use scraper::{ElementRef, Html, Selector};

/// Fields scraped from one listing, before validation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    pub name: Option<String>,
    pub price: Option<String>,
    /// Link as written in the page, possibly relative
    pub link: Option<String>,
    pub image: Option<String>,
    pub availability: Option<String>,
}

/// Per-site field extraction
pub trait Extractor: Send + Sync {
    fn extract(&self, content: &str, target: &Target) -> Vec<RawRecord>;
}

/// Extraction driven by a source's CSS selectors
#[derive(Debug)]
pub struct SelectorExtractor {
    container: Vec<Selector>,
    name: Vec<Selector>,
    name_attr: Option<String>,
    price: Vec<Selector>,
    link: Vec<Selector>,
    image: Vec<Selector>,
    availability: Vec<Selector>,
}

impl SelectorExtractor {
    /// Compiles the selectors of a source
    ///
    /// # Errors
    ///
    /// `ConfigError::InvalidSelector` naming the selector that failed to parse
    pub fn new(config: &SelectorConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            container: compile_all(&config.container)?,
            name: compile_all(&config.name)?,
            name_attr: config.name_attr.clone(),
            price: compile_all(&config.price)?,
            link: compile_all(&config.link)?,
            image: config.image.as_ref().map(compile_all).transpose()?.unwrap_or_default(),
            availability: config
                .availability
                .as_ref()
                .map(compile_all)
                .transpose()?
                .unwrap_or_default(),
        })
    }

    fn extract_one(&self, item: ElementRef<'_>) -> RawRecord {
        let name = match &self.name_attr {
            Some(attr) => first_attr(item, &self.name, attr),
            None => first_text(item, &self.name),
        };

        RawRecord {
            name,
            price: first_text(item, &self.price),
            link: first_attr(item, &self.link, "href"),
            image: first_attr(item, &self.image, "src")
                .or_else(|| first_attr(item, &self.image, "data-src")),
            availability: first_text(item, &self.availability),
        }
    }
}

impl Extractor for SelectorExtractor {
    fn extract(&self, content: &str, target: &Target) -> Vec<RawRecord> {
        let document = Html::parse_document(content);

        // First container selector that matches anything
        let records: Vec<RawRecord> = self
            .container
            .iter()
            .map(|sel| document.select(sel).peekable())
            .find_map(|mut items| items.peek().is_some().then_some(items))
            .map(|items| items.map(|item| self.extract_one(item)).collect())
            .unwrap_or_default();

        tracing::debug!("Found {} listings on {}", records.len(), target);
        records
    }
}

fn compile_all(selectors: &SelectorList) -> Result<Vec<Selector>, ConfigError> {
    selectors.iter().map(compile).collect()
}

fn compile(selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector)
        .map_err(|e| ConfigError::InvalidSelector(format!("'{}': {:?}", selector, e)))
}

/// Text of the first match of the first selector yielding any, whitespace
/// collapsed
fn first_text(item: ElementRef<'_>, selectors: &[Selector]) -> Option<String> {
    selectors.iter().find_map(|selector| {
        item.select(selector)
            .next()
            .map(|el| el.text().collect::<Vec<_>>().join(" "))
            .map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|text| !text.is_empty())
    })
}

/// Attribute of the first match carrying it, trimmed, across selectors in
/// order
fn first_attr(item: ElementRef<'_>, selectors: &[Selector], attr: &str) -> Option<String> {
    selectors.iter().find_map(|selector| {
        item.select(selector)
            .find_map(|el| el.value().attr(attr))
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn target() -> Target {
        Target {
            source: "books".to_string(),
            search_term: "books".to_string(),
            page: 1,
            url: Url::parse("https://books.example.com/catalogue/page-1.html").unwrap(),
        }
    }

    fn selectors() -> SelectorConfig {
        SelectorConfig {
            container: "article.product_pod".into(),
            name: "h3 a".into(),
            name_attr: Some("title".to_string()),
            price: "p.price_color".into(),
            link: "h3 a".into(),
            image: Some("div.image_container img".into()),
            availability: Some("p.availability".into()),
        }
    }

    const PAGE: &str = r#"
        <html><body><ol>
          <li><article class="product_pod">
            <div class="image_container"><img src="../media/cache/a.jpg"></div>
            <h3><a href="a-light-in-the-attic_1000/index.html" title="A Light in the Attic">A Light in ...</a></h3>
            <p class="price_color">£51.77</p>
            <p class="instock availability">
                <i class="icon-ok"></i>
                In stock
            </p>
          </article></li>
          <li><article class="product_pod">
            <h3><a href="tipping-the-velvet_999/index.html" title="Tipping the Velvet">Tipping ...</a></h3>
            <p class="price_color">£53.74</p>
          </article></li>
          <li><article class="product_pod">
            <h3><a title="No Link Here">No Link</a></h3>
          </article></li>
        </ol></body></html>
    "#;

    #[test]
    fn test_extract_books_listing() {
        let extractor = SelectorExtractor::new(&selectors()).unwrap();
        let records = extractor.extract(PAGE, &target());

        assert_eq!(records.len(), 3);
        assert_eq!(
            records[0],
            RawRecord {
                name: Some("A Light in the Attic".to_string()),
                price: Some("£51.77".to_string()),
                link: Some("a-light-in-the-attic_1000/index.html".to_string()),
                image: Some("../media/cache/a.jpg".into()),
                availability: Some("In stock".into()),
            }
        );
    }

    #[test]
    fn test_missing_optional_fields() {
        let extractor = SelectorExtractor::new(&selectors()).unwrap();
        let records = extractor.extract(PAGE, &target());

        assert_eq!(records[1].image, None);
        assert_eq!(records[1].availability, None);
        assert_eq!(records[2].link, None);
        assert_eq!(records[2].price, None);
    }

    #[test]
    fn test_name_from_text() {
        let mut config = selectors();
        config.name_attr = None;
        let extractor = SelectorExtractor::new(&config).unwrap();
        let records = extractor.extract(PAGE, &target());
        assert_eq!(records[0].name.as_deref(), Some("A Light in ..."));
    }

    #[test]
    fn test_no_containers() {
        let extractor = SelectorExtractor::new(&selectors()).unwrap();
        assert!(extractor
            .extract("<html><body><p>Nothing here</p></body></html>", &target())
            .is_empty());
    }

    const REDESIGNED_PAGE: &str = r#"
        <html><body><div class="grid">
          <div class="card">
            <span class="title"></span>
            <h2 class="card-title">Desk Lamp</h2>
            <span class="sale-price">$24.00</span>
            <a class="card-link" href="/p/desk-lamp">view</a>
            <img data-src="/img/lamp.jpg">
          </div>
        </div></body></html>
    "#;

    #[test]
    fn test_fallback_selectors_in_order() {
        let config = SelectorConfig {
            container: vec!["article.product_pod", "div.card"].into(),
            name: vec!["span.title", "h2.card-title"].into(),
            name_attr: None,
            price: vec!["p.price_color", "span.sale-price"].into(),
            link: vec!["h3 a", "a.card-link"].into(),
            image: Some(vec!["div.image_container img", "img"].into()),
            availability: Some(vec!["p.availability"].into()),
        };
        let extractor = SelectorExtractor::new(&config).unwrap();

        let records = extractor.extract(REDESIGNED_PAGE, &target());
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0],
            RawRecord {
                name: Some("Desk Lamp".to_string()),
                price: Some("$24.00".to_string()),
                link: Some("/p/desk-lamp".to_string()),
                image: Some("/img/lamp.jpg".to_string()),
                availability: None,
            }
        );

        // The first container selector still wins when it matches
        assert_eq!(extractor.extract(PAGE, &target()).len(), 3);
    }

    #[test]
    fn test_invalid_selector() {
        let mut config = selectors();
        config.price = vec!["p.price_color", "p..price"].into();
        assert!(matches!(
            SelectorExtractor::new(&config),
            Err(ConfigError::InvalidSelector(_))
        ));
    }
}
