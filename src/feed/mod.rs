mod reducer;
mod store;

pub use reducer::{merge_unique, reduce, FeedAction, FeedState, FilterIdentity};
pub use store::{FeedStore, SearchDebouncer, SEARCH_DEBOUNCE};

use std::pin::Pin;
use std::sync::Arc;

use futures_util::Future;

use crate::environment::types::{Color, Orientation, Photo};
use crate::environment::PhotoApi;

/// Which remote result set the current filters select, as an explicit tag
/// instead of truthiness checks at the call sites. Precedence: an active
/// collection wins outright, then a topic (free text is ignored while a
/// topic is set), then a non-blank query, then the plain listing.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Selection {
    Collection(String),
    Topic {
        slug: String,
        color: Option<Color>,
        orientation: Option<Orientation>,
    },
    Search {
        query: String,
        color: Option<Color>,
        orientation: Option<Orientation>,
    },
    Listing {
        color: Option<Color>,
        orientation: Option<Orientation>,
    },
}

impl Selection {
    pub fn from_state(state: &FeedState) -> Self {
        if let Some(id) = &state.active_collection {
            return Selection::Collection(id.clone());
        }
        if !state.topic.is_empty() {
            return Selection::Topic {
                slug: state.topic.clone(),
                color: state.selected_color,
                orientation: state.orientation,
            };
        }
        let query = state.query.trim();
        if !query.is_empty() {
            return Selection::Search {
                query: query.to_string(),
                color: state.selected_color,
                orientation: state.orientation,
            };
        }
        Selection::Listing {
            color: state.selected_color,
            orientation: state.orientation,
        }
    }

    /// The single fetch seam. Every feed load goes through here, so request
    /// fencing or cancellation can be added in one place later.
    #[allow(clippy::type_complexity)]
    pub fn request(
        &self,
        model: Arc<dyn PhotoApi>,
        page: u32,
        per_page: u32,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Photo>, String>> + Send>> {
        let selection = self.clone();
        Box::pin(async move {
            match selection {
                Selection::Collection(id) => model.collection_photos(&id, page, per_page).await,
                Selection::Topic {
                    slug,
                    color,
                    orientation,
                } => {
                    model
                        .topic_photos(&slug, page, per_page, color, orientation)
                        .await
                }
                Selection::Search {
                    query,
                    color,
                    orientation,
                } => {
                    model
                        .search_photos(&query, page, per_page, color, orientation)
                        .await
                }
                Selection::Listing { color, orientation } => {
                    model.photos(page, per_page, color, orientation).await
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_state_selects_the_listing() {
        let state = FeedState::default();
        assert_eq!(
            Selection::from_state(&state),
            Selection::Listing {
                color: None,
                orientation: None
            }
        );
    }

    #[test]
    fn collection_takes_precedence_over_everything() {
        let state = FeedState {
            active_collection: Some("C1".to_string()),
            query: "sunset".to_string(),
            topic: "nature".to_string(),
            ..Default::default()
        };
        assert_eq!(
            Selection::from_state(&state),
            Selection::Collection("C1".to_string())
        );
    }

    #[test]
    fn topic_beats_free_text() {
        let state = FeedState {
            topic: "nature".to_string(),
            query: "sunset".to_string(),
            selected_color: Some(Color::Green),
            ..Default::default()
        };
        assert_eq!(
            Selection::from_state(&state),
            Selection::Topic {
                slug: "nature".to_string(),
                color: Some(Color::Green),
                orientation: None,
            }
        );
    }

    #[test]
    fn blank_query_is_no_search() {
        let state = FeedState {
            query: "   ".to_string(),
            orientation: Some(Orientation::Portrait),
            ..Default::default()
        };
        assert_eq!(
            Selection::from_state(&state),
            Selection::Listing {
                color: None,
                orientation: Some(Orientation::Portrait),
            }
        );
    }

    #[test]
    fn query_is_trimmed_into_a_search() {
        let state = FeedState {
            query: " cats ".to_string(),
            ..Default::default()
        };
        assert_eq!(
            Selection::from_state(&state),
            Selection::Search {
                query: "cats".to_string(),
                color: None,
                orientation: None,
            }
        );
    }
}
