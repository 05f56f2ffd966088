use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogueError {
    #[error("Category could not be found")]
    UnknownCategory(String),
    #[error("Channel could not be found")]
    UnknownChannel { category: String, channel: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Channel {
    /// `tvg-id` (or the title) with spaces replaced, base64 encoded.
    pub id: String,
    pub title: String,
    pub media_url: String,
    pub logo: Option<String>,
    pub description: String,
    pub category: String,
    /// Position in the recently watched list, 1 being the latest.
    pub recent_ordinal: Option<usize>,
    pub favorite: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Category {
    pub name: String,
    pub channels: Vec<Channel>,
}

impl Category {
    pub fn channel(&self, id: &str) -> Option<&Channel> {
        self.channels.iter().find(|channel| channel.id == id)
    }
}

/// Channels grouped by category name, plus the viewer's recents and
/// favourites.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Catalogue {
    categories: BTreeMap<String, Category>,
}

impl Catalogue {
    /// Adds `channel` unless its category already holds the same id.
    pub fn insert(&mut self, channel: Channel) -> bool {
        let category = self
            .categories
            .entry(channel.category.clone())
            .or_insert_with(|| Category {
                name: channel.category.clone(),
                channels: Vec::new(),
            });
        if category.channel(&channel.id).is_some() {
            return false;
        }
        category.channels.push(channel);
        true
    }

    pub fn categories(&self) -> impl Iterator<Item = &Category> {
        self.categories.values()
    }

    pub fn category(&self, name: &str) -> Result<&Category, CatalogueError> {
        self.categories
            .get(name)
            .ok_or_else(|| CatalogueError::UnknownCategory(name.to_string()))
    }

    pub fn channel(&self, category: &str, id: &str) -> Result<&Channel, CatalogueError> {
        self.category(category)?
            .channel(id)
            .ok_or_else(|| CatalogueError::UnknownChannel {
                category: category.to_string(),
                channel: id.to_string(),
            })
    }

    fn channel_mut(&mut self, category: &str, id: &str) -> Result<&mut Channel, CatalogueError> {
        self.categories
            .get_mut(category)
            .ok_or_else(|| CatalogueError::UnknownCategory(category.to_string()))?
            .channels
            .iter_mut()
            .find(|channel| channel.id == id)
            .ok_or_else(|| CatalogueError::UnknownChannel {
                category: category.to_string(),
                channel: id.to_string(),
            })
    }

    fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.categories.values().flat_map(|category| &category.channels)
    }

    pub(super) fn channels_mut(&mut self) -> impl Iterator<Item = &mut Channel> {
        self.categories
            .values_mut()
            .flat_map(|category| category.channels.iter_mut())
    }

    pub fn channel_count(&self) -> usize {
        self.channels().count()
    }

    pub fn recent_count(&self) -> usize {
        self.channels()
            .filter(|channel| channel.recent_ordinal.is_some())
            .count()
    }

    pub fn favorite_count(&self) -> usize {
        self.channels().filter(|channel| channel.favorite).count()
    }

    /// Recently watched channels, latest first.
    pub fn recent_channels(&self) -> Vec<&Channel> {
        let mut recents: Vec<&Channel> = self
            .channels()
            .filter(|channel| channel.recent_ordinal.is_some())
            .collect();
        recents.sort_by_key(|channel| channel.recent_ordinal);
        recents
    }

    pub fn favorite_channels(&self) -> Vec<&Channel> {
        self.channels().filter(|channel| channel.favorite).collect()
    }

    /// Moves the channel to the top of the recents list.
    pub fn mark_recent(&mut self, category: &str, id: &str) -> Result<(), CatalogueError> {
        let previous = self.channel(category, id)?.recent_ordinal;
        for channel in self.channels_mut() {
            if let Some(ordinal) = channel.recent_ordinal.as_mut() {
                if previous.map_or(true, |previous| *ordinal < previous) {
                    *ordinal += 1;
                }
            }
        }
        self.channel_mut(category, id)?.recent_ordinal = Some(1);
        Ok(())
    }

    pub fn clear_recents(&mut self) {
        for channel in self.channels_mut() {
            channel.recent_ordinal = None;
        }
    }

    /// Flips the favourite flag and returns the new value.
    pub fn toggle_favorite(&mut self, category: &str, id: &str) -> Result<bool, CatalogueError> {
        let channel = self.channel_mut(category, id)?;
        channel.favorite = !channel.favorite;
        Ok(channel.favorite)
    }

    pub fn clear_favorites(&mut self) {
        for channel in self.channels_mut() {
            channel.favorite = false;
        }
    }

    /// Channels whose title contains `term`, ignoring case.
    pub fn search(&self, term: &str) -> Catalogue {
        let term = term.to_lowercase();
        let mut results = Catalogue::default();
        for channel in self.channels() {
            if channel.title.to_lowercase().contains(&term) {
                results.insert(channel.clone());
            }
        }
        results
    }

    /// Ids of the recents, latest first, for persisting.
    pub fn recent_ids(&self) -> Vec<String> {
        self.recent_channels()
            .into_iter()
            .map(|channel| channel.id.clone())
            .collect()
    }

    pub fn favorite_ids(&self) -> Vec<String> {
        self.favorite_channels()
            .into_iter()
            .map(|channel| channel.id.clone())
            .collect()
    }

    /// Re-applies persisted recents and favourites after a (re)load.
    pub fn restore(&mut self, recents: &[String], favorites: &[String]) {
        for channel in self.channels_mut() {
            channel.recent_ordinal = recents
                .iter()
                .position(|id| *id == channel.id)
                .map(|index| index + 1);
            channel.favorite = favorites.contains(&channel.id);
        }
    }
}
