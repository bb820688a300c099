use std::collections::HashMap;

use crate::environment::types::{Collection, Color, Orientation, Photo, UserProfile};

/// State of one photo feed. Created fresh per screen, never persisted.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FeedState {
    /// Deduplicated by photo id. Append-only across pages of one filter
    /// combination, replaced wholesale on a reset load.
    pub photos: im::Vector<Photo>,
    pub is_loading: bool,
    /// 1-based cursor into the remote result set for the current filters
    pub page: u32,
    pub has_more: bool,
    /// Free text search, empty means no text search
    pub query: String,
    pub selected_color: Option<Color>,
    pub orientation: Option<Orientation>,
    /// Topic slug, empty means unset
    pub topic: String,
    /// Mutually exclusive with `query`
    pub active_collection: Option<String>,
    /// Side-loaded strip for collection browsing, not part of the filter
    /// identity
    pub collections: Vec<Collection>,
    pub user: Option<UserProfile>,
}

impl Default for FeedState {
    fn default() -> Self {
        Self {
            photos: Default::default(),
            is_loading: true,
            page: 1,
            has_more: true,
            query: Default::default(),
            selected_color: Default::default(),
            orientation: Default::default(),
            topic: Default::default(),
            active_collection: Default::default(),
            collections: Default::default(),
            user: Default::default(),
        }
    }
}

/// The filter dimensions that define which remote result set the feed is
/// paging through. Any change here means: back to page 1, reset load.
pub type FilterIdentity = (
    String,
    Option<Color>,
    Option<Orientation>,
    String,
    Option<String>,
);

impl FeedState {
    pub fn filter_identity(&self) -> FilterIdentity {
        (
            self.query.clone(),
            self.selected_color,
            self.orientation,
            self.topic.clone(),
            self.active_collection.clone(),
        )
    }
}

#[derive(Clone)]
pub enum FeedAction {
    SetUser(UserProfile),
    SetCollections(Vec<Collection>),
    SetQuery(String),
    SetColor(Option<Color>),
    SetOrientation(Option<Orientation>),
    SetTopic(String),
    SetActiveCollection(Option<String>),
    LoadStart,
    LoadSuccess { photos: Vec<Photo>, reset: bool },
    NextPage,
    /// Immediate search: clears the current feed and starts loading right
    /// away instead of waiting for the next reset load to land.
    SearchStart(String),
    ClearSearch,
}

impl std::fmt::Debug for FeedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SetUser(user) => f.debug_tuple("SetUser").field(&user.username).finish(),
            Self::SetCollections(list) => {
                f.debug_tuple("SetCollections").field(&list.len()).finish()
            }
            Self::SetQuery(query) => f.debug_tuple("SetQuery").field(query).finish(),
            Self::SetColor(color) => f.debug_tuple("SetColor").field(color).finish(),
            Self::SetOrientation(o) => f.debug_tuple("SetOrientation").field(o).finish(),
            Self::SetTopic(topic) => f.debug_tuple("SetTopic").field(topic).finish(),
            Self::SetActiveCollection(id) => {
                f.debug_tuple("SetActiveCollection").field(id).finish()
            }
            Self::LoadStart => write!(f, "LoadStart"),
            Self::LoadSuccess { photos, reset } => f
                .debug_struct("LoadSuccess")
                .field("photos", &photos.len())
                .field("reset", reset)
                .finish(),
            Self::NextPage => write!(f, "NextPage"),
            Self::SearchStart(query) => f.debug_tuple("SearchStart").field(query).finish(),
            Self::ClearSearch => write!(f, "ClearSearch"),
        }
    }
}

/// Pure transition function. No I/O; fetching lives in the store.
pub fn reduce(state: &FeedState, action: FeedAction) -> FeedState {
    log::trace!("{action:?}");
    let mut state = state.clone();
    match action {
        FeedAction::SetUser(user) => {
            state.user = Some(user);
        }
        FeedAction::SetCollections(collections) => {
            state.collections = collections;
        }
        FeedAction::SetQuery(query) => {
            state.query = query;
            state.page = 1;
            state.active_collection = None;
        }
        FeedAction::SetColor(color) => {
            state.selected_color = color;
            state.page = 1;
        }
        FeedAction::SetOrientation(orientation) => {
            state.orientation = orientation;
            state.page = 1;
            state.photos.clear();
        }
        FeedAction::SetTopic(topic) => {
            state.topic = topic;
            state.active_collection = None;
            state.page = 1;
            state.photos.clear();
        }
        FeedAction::SetActiveCollection(id) => {
            state.active_collection = id;
            state.query.clear();
            state.page = 1;
        }
        FeedAction::LoadStart => {
            state.is_loading = true;
        }
        FeedAction::LoadSuccess { photos, reset } => {
            state.has_more = !photos.is_empty();
            state.photos = if reset {
                photos.into_iter().collect()
            } else {
                merge_unique(&state.photos, photos)
            };
            state.is_loading = false;
        }
        FeedAction::NextPage => {
            state.page += 1;
        }
        FeedAction::SearchStart(query) => {
            state.query = query;
            state.page = 1;
            state.photos.clear();
            state.is_loading = true;
            state.active_collection = None;
            state.topic.clear();
        }
        FeedAction::ClearSearch => {
            state.query.clear();
            state.photos.clear();
            state.page = 1;
            state.is_loading = true;
        }
    }
    state
}

/// Keyed-map merge: every id appears exactly once, at its first-seen
/// position, holding the last-written value.
pub fn merge_unique(existing: &im::Vector<Photo>, incoming: Vec<Photo>) -> im::Vector<Photo> {
    let mut merged = im::Vector::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    for photo in existing.iter().cloned().chain(incoming) {
        match positions.get(&photo.id) {
            Some(&idx) => {
                merged.set(idx, photo);
            }
            None => {
                positions.insert(photo.id.clone(), merged.len());
                merged.push_back(photo);
            }
        }
    }
    merged
}
