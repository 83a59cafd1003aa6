use std::collections::HashSet;

use log::debug;
use scraper::{ElementRef, Html, Selector};

use crate::error::{RadarError, Result};
use crate::models::Record;

const NAME_SELECTOR: &str = ".video-name";
const INFO_SELECTOR: &str = ".web-info";

/// Separates the platform from the "went live N days ago" suffix.
const LIVE_MARKER: &str = "上线";
const FIRST_DAY_MARKER: &str = "上线首日";

/// Parse the ranking page into records, in page order, one per distinct name.
pub fn extract(markup: &str) -> Result<Vec<Record>> {
    let document = Html::parse_document(markup);

    let name_selector =
        Selector::parse(NAME_SELECTOR).map_err(|e| RadarError::selector(NAME_SELECTOR, e))?;
    let info_selector =
        Selector::parse(INFO_SELECTOR).map_err(|e| RadarError::selector(INFO_SELECTOR, e))?;

    let names: Vec<(ElementRef, String)> = document
        .select(&name_selector)
        .map(|el| (el, element_text(el)))
        .filter(|(_, text)| !text.is_empty())
        .collect();

    if names.is_empty() {
        return Err(RadarError::NoRecordsFound);
    }

    // Prefer the info element that lives in the same item container as the
    // name. Flat markup has no such container, so fall back to page order.
    let owned: Vec<Option<ElementRef>> = names
        .iter()
        .map(|(el, _)| own_info(*el, &name_selector, &info_selector))
        .collect();

    let infos: Vec<String> = if owned.iter().any(Option::is_some) {
        debug!("Pairing names and infos by container");
        owned
            .into_iter()
            .map(|info| info.map(element_text).unwrap_or_default())
            .collect()
    } else {
        debug!("Pairing names and infos by position");
        let mut positional: Vec<String> = document.select(&info_selector).map(element_text).collect();
        positional.resize(names.len(), String::new());
        positional
    };

    let mut seen = HashSet::new();
    let mut records = Vec::with_capacity(names.len());

    for ((_, name), info) in names.into_iter().zip(infos) {
        if !seen.insert(name.clone()) {
            debug!("Dropping duplicate entry for {name}");
            continue;
        }
        records.push(Record {
            category: category_of(&info),
            is_first_day: is_first_day(&info),
            volatile_descriptor: volatile_descriptor_of(&info),
            name,
        });
    }

    debug!("Extracted {} records", records.len());
    Ok(records)
}

/// The info element sharing the closest container with `name`, provided that
/// container holds no other name.
fn own_info<'a>(
    name: ElementRef<'a>,
    name_selector: &Selector,
    info_selector: &Selector,
) -> Option<ElementRef<'a>> {
    for ancestor in name.ancestors().filter_map(ElementRef::wrap) {
        if ancestor.select(name_selector).nth(1).is_some() {
            return None;
        }
        if let Some(info) = ancestor.select(info_selector).next() {
            return Some(info);
        }
    }
    None
}

fn element_text(el: ElementRef) -> String {
    normalize_whitespace(&el.text().collect::<String>())
}

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Everything before the live marker, e.g. "腾讯视频独播" from "腾讯视频独播 上线8天".
pub fn category_of(info: &str) -> String {
    let base = match info.find(LIVE_MARKER) {
        Some(idx) => &info[..idx],
        None => info,
    };
    normalize_whitespace(base)
}

pub fn is_first_day(info: &str) -> bool {
    info.contains(FIRST_DAY_MARKER)
}

pub fn volatile_descriptor_of(info: &str) -> String {
    info.find(LIVE_MARKER)
        .map(|idx| normalize_whitespace(&info[idx..]))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_page(pairs: &[(&str, &str)]) -> String {
        let mut body = String::new();
        for (name, info) in pairs {
            body.push_str(&format!(
                "<p class=\"video-name\">{name}</p><p class=\"web-info\">{info}</p>"
            ));
        }
        format!("<html><body><div class=\"list\">{body}</div></body></html>")
    }

    #[test]
    fn test_extract_drops_duplicate_names() {
        let html = flat_page(&[
            ("Show A", "PlatformX 上线首日"),
            ("Show B", "PlatformY 上线8天"),
            ("Show A", "PlatformZ 上线2天"),
        ]);

        let records = extract(&html).unwrap();

        assert_eq!(
            records,
            vec![
                Record {
                    name: "Show A".into(),
                    category: "PlatformX".into(),
                    is_first_day: true,
                    volatile_descriptor: "上线首日".into(),
                },
                Record {
                    name: "Show B".into(),
                    category: "PlatformY".into(),
                    is_first_day: false,
                    volatile_descriptor: "上线8天".into(),
                },
            ]
        );
    }

    #[test]
    fn test_extract_without_names_fails() {
        let html = "<html><body><p class=\"web-info\">PlatformX 上线首日</p></body></html>";
        assert!(matches!(extract(html), Err(RadarError::NoRecordsFound)));
        assert!(matches!(extract(""), Err(RadarError::NoRecordsFound)));
    }

    #[test]
    fn test_extract_normalizes_whitespace_and_nested_text() {
        let html = r#"
            <div>
              <p class="title video-name">
                 Long   <span>Night</span>
              </p>
              <p class="web-info">芒果TV独播
                 上线  首日</p>
            </div>"#;

        let records = extract(html).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Long Night");
        assert_eq!(records[0].category, "芒果TV独播");
        assert_eq!(records[0].volatile_descriptor, "上线 首日");
        // the first-day marker is matched on the raw text
        assert!(!records[0].is_first_day);
    }

    #[test]
    fn test_extract_matches_class_token_on_any_tag() {
        let html = r#"<ul>
            <li><span class="video-name">Show A</span><em class="web-info">PlatformX 上线3天</em></li>
        </ul>"#;

        let records = extract(html).unwrap();
        assert_eq!(records[0].name, "Show A");
        assert_eq!(records[0].category, "PlatformX");
    }

    #[test]
    fn test_flat_markup_with_missing_infos_defaults_to_empty() {
        let html = r#"<div>
            <p class="video-name">Show A</p>
            <p class="video-name">Show B</p>
            <p class="web-info">PlatformX 上线8天</p>
        </div>"#;

        let records = extract(html).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].category, "PlatformX");
        assert_eq!(records[1].category, "");
        assert_eq!(records[1].volatile_descriptor, "");
        assert!(!records[1].is_first_day);
    }

    #[test]
    fn test_item_containers_pair_infos_structurally() {
        // Show A has no info of its own; position-based pairing would hand it Show B's.
        let html = r#"<div class="list">
            <div class="item"><p class="video-name">Show A</p></div>
            <div class="item"><p class="video-name">Show B</p><p class="web-info">PlatformY 上线首日</p></div>
            <div class="item"><p class="web-info">PlatformZ 上线2天</p><p class="video-name">Show C</p></div>
        </div>"#;

        let records = extract(html).unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].name, "Show A");
        assert_eq!(records[0].category, "");
        assert_eq!(records[1].category, "PlatformY");
        assert!(records[1].is_first_day);
        assert_eq!(records[2].category, "PlatformZ");
        assert_eq!(records[2].volatile_descriptor, "上线2天");
    }

    #[test]
    fn test_empty_names_are_skipped() {
        let html = flat_page(&[("  ", "PlatformX 上线首日"), ("Show B", "PlatformY 上线8天")]);

        let records = extract(&html).unwrap();

        // Flat markup pairs by position over non-empty names, as the page lists them.
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Show B");
        assert_eq!(records[0].category, "PlatformX");
    }

    #[test]
    fn test_info_helpers() {
        assert_eq!(category_of("腾讯视频独播 上线8天"), "腾讯视频独播");
        assert_eq!(category_of("  优酷  独播 "), "优酷 独播");
        assert_eq!(category_of(""), "");
        assert_eq!(volatile_descriptor_of("优酷独播"), "");
        assert_eq!(volatile_descriptor_of("优酷独播 上线12天"), "上线12天");
        assert!(is_first_day("芒果TV独播 上线首日"));
        assert!(!is_first_day("芒果TV独播 上线1天"));
    }
}
