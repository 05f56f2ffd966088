//! XML pages served to the set-top box.

use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};

use super::locale::Translations;
use crate::m3u::{Catalogue, Channel, MISSING_LOGO};
use crate::xml::{Document, Element};

pub const MAIN_ID: &str = "templates/main.xml";
pub const PLAYER_ID: &str = "com.atvkit.player";
pub const SEARCH_ID: &str = "com.atvkit.search";
pub const LOGS_ID: &str = "com.atvkit.logs";

/// Values shown on the settings page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsData {
    pub version: String,
    pub m3u_path: String,
    pub channel_count: usize,
    pub recent_count: usize,
    pub favorite_count: usize,
    pub logs_active: bool,
}

/// Builds pages for one request: absolute links start at `base`, labels
/// come from `translations`.
pub struct Pages<'a> {
    base: &'a str,
    translations: Translations,
}

fn query(value: &str) -> String {
    utf8_percent_encode(value, NON_ALPHANUMERIC).to_string()
}

/// Quotes `value` as a single-quoted script string.
fn js_string(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{escaped}'")
}

fn load_url(url: &str) -> String {
    format!("atv.loadURL({})", js_string(url))
}

fn document(content: Element) -> Document {
    Document::new(Element::new("atv").with_child(Element::new("body").with_child(content)))
}

fn header(title: &str) -> Element {
    Element::new("header").with_child(
        Element::new("simpleHeader")
            .with_attr("accessibilityLabel", title)
            .with_child(Element::new("title").with_text(title)),
    )
}

fn menu_item(id: &str, label: &str) -> Element {
    Element::new("oneLineMenuItem")
        .with_attr("id", id)
        .with_attr("accessibilityLabel", label)
        .with_child(Element::new("label").with_text(label))
}

impl<'a> Pages<'a> {
    pub fn new(base: &'a str, translations: Translations) -> Self {
        Self { base, translations }
    }

    fn t(&self, key: &'static str) -> &'static str {
        self.translations.get(key)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    /// Cached and placeholder logos are served here; anything else is a
    /// remote URL left as is.
    fn logo_url(&self, channel: &Channel) -> String {
        match channel.logo.as_deref() {
            Some(logo) if !logo.starts_with('/') => logo.to_string(),
            logo => self.url(logo.unwrap_or(MISSING_LOGO)),
        }
    }

    fn channel_url(&self, path: &str, channel: &Channel) -> String {
        self.url(&format!(
            "{path}?category={}&channel={}",
            query(&channel.category),
            query(&channel.id)
        ))
    }

    fn list(&self, id: &str, title: &str, sections: Vec<(Option<String>, Vec<Element>)>) -> Document {
        let mut section_list = Element::new("sections");
        let mut empty = true;
        for (heading, items) in sections {
            if items.is_empty() {
                continue;
            }
            empty = false;
            let mut section = Element::new("menuSection");
            if let Some(heading) = heading {
                section.append_child(Element::new("header").with_child(
                    Element::new("horizontalDividerHeader")
                        .with_child(Element::new("title").with_text(heading)),
                ));
            }
            let mut list = Element::new("items");
            for item in items {
                list.append_child(item);
            }
            section_list.append_child(section.with_child(list));
        }
        if empty {
            section_list.append_child(
                Element::new("menuSection").with_child(
                    Element::new("items")
                        .with_child(menu_item("empty", self.t("empty")).with_attr("dimmed", "true")),
                ),
            );
        }
        document(
            Element::new("listWithPreview")
                .with_attr("id", id)
                .with_child(header(title))
                .with_child(Element::new("menu").with_child(section_list)),
        )
    }

    fn channel_item(&self, channel: &Channel) -> Element {
        let player = load_url(&self.channel_url("/player.xml", channel));
        Element::new("twoLineEnhancedMenuItem")
            .with_attr("id", &channel.id)
            .with_attr("accessibilityLabel", &channel.title)
            .with_attr("onPlay", &player)
            .with_attr("onSelect", &player)
            .with_attr(
                "onHoldSelect",
                load_url(&self.channel_url("/channel-options.xml", channel)),
            )
            .with_child(Element::new("label").with_text(&channel.title))
            .with_child(Element::new("label2").with_text(&channel.category))
            .with_child(
                Element::new("image")
                    .with_attr("type", "16X9")
                    .with_text(self.logo_url(channel)),
            )
    }

    fn counted_link(&self, id: &str, label: &str, count: usize, path: &str) -> Element {
        menu_item(id, label)
            .with_attr("onSelect", load_url(&self.url(path)))
            .with_child(Element::new("rightLabel").with_text(count.to_string()))
    }

    /// Root page with the navigation bar.
    pub fn main(&self) -> Document {
        let mut navigation = Element::new("navigation").with_attr("currentIndex", "0");
        for (id, key, path) in [
            ("channels", "channels", "/channels.xml"),
            ("search", "search", "/search.xml"),
            ("settings", "settings", "/settings.xml"),
        ] {
            navigation.append_child(
                Element::new("navigationItem")
                    .with_attr("id", id)
                    .with_child(Element::new("title").with_text(self.t(key)))
                    .with_child(Element::new("url").with_text(self.url(path))),
            );
        }
        document(
            Element::new("viewWithNavigationBar")
                .with_attr("id", MAIN_ID)
                .with_attr("onNavigate", "handleNavbarNavigate(event);")
                .with_child(navigation),
        )
    }

    pub fn channels(&self, catalogue: &Catalogue) -> Document {
        let shortcuts = vec![
            self.counted_link("recent", self.t("recent"), catalogue.recent_count(), "/recent.xml"),
            self.counted_link(
                "favorites",
                self.t("favorites"),
                catalogue.favorite_count(),
                "/favorites.xml",
            ),
        ];
        let categories: Vec<Element> = catalogue
            .categories()
            .map(|category| {
                self.counted_link(
                    &format!("category-{}", query(&category.name)),
                    &category.name,
                    category.channels.len(),
                    &format!("/category.xml?category={}", query(&category.name)),
                )
            })
            .collect();
        self.list(
            "com.atvkit.channels",
            self.t("channels"),
            vec![(None, shortcuts), (Some(self.t("categories").to_string()), categories)],
        )
    }

    pub fn category(&self, name: &str, channels: &[Channel]) -> Document {
        let items: Vec<Element> = channels.iter().map(|channel| self.channel_item(channel)).collect();
        self.list("com.atvkit.category", name, vec![(None, items)])
    }

    pub fn channel_list(&self, id: &str, title_key: &'static str, channels: &[&Channel]) -> Document {
        let items: Vec<Element> = channels.iter().map(|channel| self.channel_item(channel)).collect();
        self.list(id, self.t(title_key), vec![(None, items)])
    }

    pub fn channel_options(&self, channel: &Channel) -> Document {
        let toggle = format!(
            "callUrlAndUnload({}, 'GET')",
            js_string(&self.channel_url("/toggle-favorite.xml", channel))
        );
        let items = Element::new("items")
            .with_child(
                menu_item("play", self.t("play"))
                    .with_attr("onSelect", load_url(&self.channel_url("/player.xml", channel))),
            )
            .with_child(menu_item("toggle-favorite", self.t("toggle-favorite")).with_attr("onSelect", toggle));
        document(
            Element::new("optionDialog")
                .with_attr("id", "com.atvkit.channel-options")
                .with_child(header(&channel.title))
                .with_child(Element::new("description").with_text(self.t("channel-options")))
                .with_child(
                    Element::new("menu").with_child(
                        Element::new("sections")
                            .with_child(Element::new("menuSection").with_child(items)),
                    ),
                ),
        )
    }

    pub fn player(&self, channel: &Channel) -> Document {
        let asset = Element::new("httpLiveStreamingVideoAsset")
            .with_attr("id", &channel.id)
            .with_child(Element::new("mediaURL").with_text(&channel.media_url))
            .with_child(Element::new("title").with_text(&channel.title))
            .with_child(Element::new("description").with_text(&channel.description))
            .with_child(
                Element::new("image").with_text(self.logo_url(channel)),
            );
        document(Element::new("videoPlayer").with_attr("id", PLAYER_ID).with_child(asset))
    }

    pub fn search(&self) -> Document {
        document(
            Element::new("search")
                .with_attr("id", SEARCH_ID)
                .with_child(header(self.t("search")))
                .with_child(
                    Element::new("instructions").with_text(self.t("search-instructions")),
                )
                .with_child(
                    Element::new("baseURL").with_text(self.url("/search-results.xml?term=")),
                ),
        )
    }

    pub fn search_results(&self, results: &Catalogue) -> Document {
        let sections = results
            .categories()
            .map(|category| {
                let items: Vec<Element> = category
                    .channels
                    .iter()
                    .map(|channel| self.channel_item(channel))
                    .collect();
                (Some(category.name.clone()), items)
            })
            .collect();
        self.list("com.atvkit.search-results", self.t("search-results"), sections)
    }

    pub fn settings(&self, data: &SettingsData) -> Document {
        let update = |id: &str, path: &str| {
            format!(
                "callUrlAndUpdateElement({}, {}, 'GET')",
                js_string(id),
                js_string(&self.url(path))
            )
        };
        let counted = |id: &str, key: &'static str, count: usize, path: &str| {
            let mut row = menu_item(id, self.t(key))
                .with_attr("onSelect", update(id, path))
                .with_child(Element::new("rightLabel").with_text(count.to_string()))
                .with_child(Element::new("accessories"));
            if count == 0 {
                row.set_attribute("dimmed", "true");
            }
            row
        };

        let edit = format!(
            "editM3UAddress({}, {}, {}, {}, {})",
            js_string(self.t("m3u-path")),
            js_string(self.t("m3u-instructions")),
            js_string(self.t("m3u-path")),
            js_string(self.t("m3u-footnote")),
            js_string(&data.m3u_path)
        );
        let mut items = vec![
            menu_item("version", self.t("version"))
                .with_child(Element::new("rightLabel").with_text(&data.version)),
            Element::new("twoLineMenuItem")
                .with_attr("id", "edit-m3u")
                .with_attr("onSelect", edit)
                .with_child(Element::new("label").with_text(self.t("m3u-path")))
                .with_child(Element::new("label2").with_text(&data.m3u_path)),
        ];
        let mut reload = counted(
            "reload-channels",
            "reload-channels",
            data.channel_count,
            "/reload-channels.xml",
        );
        if data.m3u_path.is_empty() {
            reload.set_attribute("dimmed", "true");
        }
        items.push(reload);
        items.push(counted("clear-recent", "clear-recent", data.recent_count, "/clear-recent.xml"));
        items.push(counted(
            "clear-favorites",
            "clear-favorites",
            data.favorite_count,
            "/clear-favorites.xml",
        ));
        if data.logs_active {
            items.push(
                menu_item("logs", self.t("logs")).with_attr("onSelect", load_url(&self.url("/logs.xml"))),
            );
        }
        self.list("com.atvkit.settings", self.t("settings"), vec![(None, items)])
    }

    pub fn logs(&self, contents: &str) -> Document {
        document(
            Element::new("scrollingText")
                .with_attr("id", LOGS_ID)
                .with_child(Element::new("title").with_text(self.t("logs")))
                .with_child(Element::new("text").with_text(contents)),
        )
    }
}
