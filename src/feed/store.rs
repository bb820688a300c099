use std::time::Duration;

use tokio::task::JoinHandle;

use super::reducer::{reduce, FeedAction, FeedState};
use super::Selection;
use crate::environment::types::AuthError;
use crate::environment::Environment;

/// Quiet period before a keystroke burst becomes a query change.
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(500);

/// Trailing-edge debounce over one timer: each new input aborts the pending
/// timer and starts a fresh one, so only the latest text within the window
/// survives. The timer dies with the debouncer.
pub struct SearchDebouncer {
    delay: Duration,
    sender: flume::Sender<FeedAction>,
    pending: Option<JoinHandle<()>>,
}

impl SearchDebouncer {
    fn new(delay: Duration, sender: flume::Sender<FeedAction>) -> Self {
        Self {
            delay,
            sender,
            pending: None,
        }
    }

    pub fn input(&mut self, text: impl Into<String>) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
        let text = text.into();
        let sender = self.sender.clone();
        // Anchor the deadline at the keystroke itself, not at the spawned
        // task's first poll.
        let sleep = tokio::time::sleep(self.delay);
        self.pending = Some(tokio::spawn(async move {
            sleep.await;
            let _ = sender.send(FeedAction::SetQuery(text));
        }));
    }
}

impl Drop for SearchDebouncer {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
    }
}

/// Owns one feed's state and coordinates it with the collaborators: applies
/// reducer transitions, decides when a filter change requires a reset load,
/// routes the fetch, and folds results (or failures) back into the state.
///
/// Nothing in here ever propagates a fetch error to the caller; a failed
/// fetch looks exactly like an empty page.
pub struct FeedStore {
    state: FeedState,
    environment: Environment,
    debouncer: SearchDebouncer,
    actions: flume::Receiver<FeedAction>,
}

impl FeedStore {
    pub fn new(environment: Environment) -> Self {
        Self::with_debounce(environment, SEARCH_DEBOUNCE)
    }

    pub fn with_debounce(environment: Environment, delay: Duration) -> Self {
        let (sender, actions) = flume::unbounded();
        Self {
            state: FeedState::default(),
            environment,
            debouncer: SearchDebouncer::new(delay, sender),
            actions,
        }
    }

    pub fn state(&self) -> &FeedState {
        &self.state
    }

    /// First activation of the screen: resolve the persisted session token
    /// into a user, side-load the collections strip, and load page 1.
    /// A missing or rejected token clears the session and bubbles up so the
    /// enclosing screen can redirect to login.
    pub async fn bootstrap(&mut self) -> Result<(), AuthError> {
        let Some(token) = self.environment.repository.token() else {
            return Err(AuthError::MissingToken);
        };
        match self.environment.accounts.user_info(&token).await {
            Ok(profile) => {
                self.environment.repository.set_current_user(&profile);
                self.apply(FeedAction::SetUser(profile));
            }
            Err(e) => {
                log::warn!("Session token rejected: {e}");
                self.environment.repository.clear_session();
                return Err(e);
            }
        }

        self.load_collections_strip().await;
        self.reload().await;
        Ok(())
    }

    /// Apply an action; if it changed the filter identity, follow up with
    /// exactly one page-1 reset load. Unrelated transitions (loading flags,
    /// user, collections) never trigger a fetch.
    pub async fn dispatch(&mut self, action: FeedAction) {
        let before = self.state.filter_identity();
        self.apply(action);
        if self.state.filter_identity() != before {
            self.reload().await;
        }
    }

    pub async fn reload(&mut self) {
        self.fetch(1, true).await;
    }

    /// Infinite-scroll trigger. Ignored while a page is in flight or after
    /// the feed ran dry.
    pub async fn load_more(&mut self) {
        if self.state.is_loading || !self.state.has_more {
            return;
        }
        self.apply(FeedAction::NextPage);
        let page = self.state.page;
        self.fetch(page, false).await;
    }

    /// Buffer raw keystrokes; 500 ms of silence turns the latest text into
    /// a `SetQuery`, delivered through `pump`.
    pub fn search_input(&mut self, text: impl Into<String>) {
        self.debouncer.input(text);
    }

    /// Await the next debounced action and dispatch it. Returns `false`
    /// once the channel is gone.
    pub async fn pump(&mut self) -> bool {
        match self.actions.recv_async().await {
            Ok(action) => {
                self.dispatch(action).await;
                true
            }
            Err(_) => false,
        }
    }

    /// Dispatch whatever debounced actions are already due, without waiting.
    pub async fn pump_pending(&mut self) -> usize {
        let mut dispatched = 0;
        while let Ok(action) = self.actions.try_recv() {
            self.dispatch(action).await;
            dispatched += 1;
        }
        dispatched
    }

    /// Collection browsing: replaces the side-loaded `collections` list via
    /// search or plain listing. Failures collapse into an empty load result
    /// like every other fetch.
    pub async fn browse_collections(&mut self, query: &str, page: u32) {
        self.apply(FeedAction::LoadStart);
        let per_page = self.environment.config.page_size;
        let result = if query.trim().is_empty() {
            self.environment.model.collections(page, per_page).await
        } else {
            self.environment
                .model
                .search_collections(query.trim(), page, per_page)
                .await
        };
        match result {
            Ok(collections) => self.apply(FeedAction::SetCollections(collections)),
            Err(e) => log::error!("Error loading collections: {e}"),
        }
        // clears the loading flag without touching the photo feed
        self.apply(FeedAction::LoadSuccess {
            photos: Vec::new(),
            reset: false,
        });
    }

    async fn load_collections_strip(&mut self) {
        let size = self.environment.config.collections_strip_size;
        match self.environment.model.collections(1, size).await {
            Ok(collections) => self.apply(FeedAction::SetCollections(collections)),
            Err(e) => log::error!("Error loading collections: {e}"),
        }
    }

    /// The one place a fetch happens. A rejected request is logged and
    /// folded into `LoadSuccess` with an empty page; the loading flag is
    /// never left dangling.
    async fn fetch(&mut self, page: u32, reset: bool) {
        self.apply(FeedAction::LoadStart);
        let selection = Selection::from_state(&self.state);
        let per_page = self.environment.config.page_size;
        let request = selection.request(self.environment.model.clone(), page, per_page);
        let photos = match request.await {
            Ok(photos) => photos,
            Err(e) => {
                log::error!("Error loading photos: {e}");
                Vec::new()
            }
        };
        self.apply(FeedAction::LoadSuccess { photos, reset });
    }

    fn apply(&mut self, action: FeedAction) {
        self.state = reduce(&self.state, action);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::auth::{AccountApi, ProfileUpdate, Session};
    use crate::environment::model::PhotoApi;
    use crate::environment::types::{Collection, Color, Orientation, Photo, UserProfile};
    use crate::environment::{ApiConfig, Repository};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct MockPhotos {
        calls: Mutex<Vec<String>>,
        photo_responses: Mutex<VecDeque<Result<Vec<Photo>, String>>>,
        collection_responses: Mutex<VecDeque<Result<Vec<Collection>, String>>>,
    }

    impl MockPhotos {
        fn queue_photos(&self, response: Result<Vec<Photo>, String>) {
            self.photo_responses.lock().unwrap().push_back(response);
        }

        fn queue_collections(&self, response: Result<Vec<Collection>, String>) {
            self.collection_responses.lock().unwrap().push_back(response);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn next_photos(&self) -> Result<Vec<Photo>, String> {
            self.photo_responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }

        fn next_collections(&self) -> Result<Vec<Collection>, String> {
            self.collection_responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    fn filter_suffix(color: Option<Color>, orientation: Option<Orientation>) -> String {
        let mut suffix = String::new();
        if let Some(color) = color {
            suffix.push_str(&format!(" color={color}"));
        }
        if let Some(orientation) = orientation {
            suffix.push_str(&format!(" orientation={orientation}"));
        }
        suffix
    }

    #[async_trait]
    impl PhotoApi for MockPhotos {
        async fn photos(
            &self,
            page: u32,
            _per_page: u32,
            color: Option<Color>,
            orientation: Option<Orientation>,
        ) -> Result<Vec<Photo>, String> {
            self.record(format!("photos page={page}{}", filter_suffix(color, orientation)));
            self.next_photos()
        }

        async fn search_photos(
            &self,
            query: &str,
            page: u32,
            _per_page: u32,
            color: Option<Color>,
            orientation: Option<Orientation>,
        ) -> Result<Vec<Photo>, String> {
            self.record(format!(
                "search {query} page={page}{}",
                filter_suffix(color, orientation)
            ));
            self.next_photos()
        }

        async fn topic_photos(
            &self,
            slug: &str,
            page: u32,
            _per_page: u32,
            color: Option<Color>,
            orientation: Option<Orientation>,
        ) -> Result<Vec<Photo>, String> {
            self.record(format!(
                "topic {slug} page={page}{}",
                filter_suffix(color, orientation)
            ));
            self.next_photos()
        }

        async fn collection_photos(
            &self,
            collection_id: &str,
            page: u32,
            _per_page: u32,
        ) -> Result<Vec<Photo>, String> {
            self.record(format!("collection {collection_id} page={page}"));
            self.next_photos()
        }

        async fn collections(&self, page: u32, per_page: u32) -> Result<Vec<Collection>, String> {
            self.record(format!("collections page={page} per_page={per_page}"));
            self.next_collections()
        }

        async fn search_collections(
            &self,
            query: &str,
            page: u32,
            _per_page: u32,
        ) -> Result<Vec<Collection>, String> {
            self.record(format!("search-collections {query} page={page}"));
            self.next_collections()
        }
    }

    struct MockAccounts {
        token: String,
        profile: UserProfile,
    }

    impl MockAccounts {
        fn accepting(token: &str) -> Self {
            Self {
                token: token.to_string(),
                profile: UserProfile {
                    id: 1,
                    username: "ana".to_string(),
                    ..Default::default()
                },
            }
        }
    }

    #[async_trait]
    impl AccountApi for MockAccounts {
        async fn login(&self, _username: &str, _password: &str) -> Result<Session, AuthError> {
            Err(AuthError::Remote("not wired in tests".to_string()))
        }

        async fn user_info(&self, token: &str) -> Result<UserProfile, AuthError> {
            if token == self.token {
                Ok(self.profile.clone())
            } else {
                Err(AuthError::InvalidToken)
            }
        }

        async fn update_user(
            &self,
            _user_id: u64,
            _token: &str,
            _update: ProfileUpdate,
        ) -> Result<UserProfile, AuthError> {
            Err(AuthError::Remote("not wired in tests".to_string()))
        }

        async fn delete_user(&self, _user_id: u64, _token: &str) -> Result<(), AuthError> {
            Err(AuthError::Remote("not wired in tests".to_string()))
        }
    }

    fn store_with(photos: Arc<MockPhotos>) -> (FeedStore, Repository) {
        let repository = Repository::in_memory();
        let environment = Environment::with_collaborators(
            photos,
            Arc::new(MockAccounts::accepting("mock-token-1")),
            repository.clone(),
            ApiConfig::default(),
        );
        (FeedStore::new(environment), repository)
    }

    fn ids(state: &FeedState) -> Vec<String> {
        state.photos.iter().map(|p| p.id.clone()).collect()
    }

    fn page(ids: &[&str]) -> Result<Vec<Photo>, String> {
        Ok(ids.iter().map(|id| Photo::with_id(*id)).collect())
    }

    #[tokio::test]
    async fn bootstrap_without_token_signals_unauthenticated() {
        let photos = Arc::new(MockPhotos::default());
        let (mut store, _repo) = store_with(photos.clone());
        assert_eq!(store.bootstrap().await, Err(AuthError::MissingToken));
        assert!(photos.calls().is_empty());
    }

    #[tokio::test]
    async fn bootstrap_with_rejected_token_clears_the_session() {
        let photos = Arc::new(MockPhotos::default());
        let (mut store, repo) = store_with(photos.clone());
        repo.set_token("stale");
        assert_eq!(store.bootstrap().await, Err(AuthError::InvalidToken));
        assert_eq!(repo.token(), None);
        assert!(photos.calls().is_empty());
    }

    #[tokio::test]
    async fn bootstrap_sets_user_and_loads_first_page() {
        let photos = Arc::new(MockPhotos::default());
        photos.queue_collections(Ok(vec![Collection {
            id: "C1".to_string(),
            title: "Nature".to_string(),
            ..Default::default()
        }]));
        photos.queue_photos(page(&["1", "2"]));

        let (mut store, repo) = store_with(photos.clone());
        repo.set_token("mock-token-1");
        store.bootstrap().await.unwrap();

        assert_eq!(store.state().user.as_ref().unwrap().username, "ana");
        assert_eq!(store.state().collections.len(), 1);
        assert_eq!(ids(store.state()), vec!["1", "2"]);
        assert!(!store.state().is_loading);
        assert_eq!(
            photos.calls(),
            vec!["collections page=1 per_page=5", "photos page=1"]
        );
    }

    #[tokio::test]
    async fn filter_change_triggers_exactly_one_reset_load() {
        let photos = Arc::new(MockPhotos::default());
        let (mut store, _repo) = store_with(photos.clone());

        store.dispatch(FeedAction::SetColor(Some(Color::Teal))).await;
        assert_eq!(photos.calls(), vec!["photos page=1 color=teal"]);

        // unrelated transitions never fetch
        store.dispatch(FeedAction::SetUser(UserProfile::default())).await;
        store.dispatch(FeedAction::SetCollections(vec![])).await;
        store.dispatch(FeedAction::LoadStart).await;
        store
            .dispatch(FeedAction::LoadSuccess {
                photos: vec![],
                reset: false,
            })
            .await;
        assert_eq!(photos.calls().len(), 1);
    }

    #[tokio::test]
    async fn active_collection_routes_to_the_collection_endpoint() {
        let photos = Arc::new(MockPhotos::default());
        let (mut store, _repo) = store_with(photos.clone());

        store
            .dispatch(FeedAction::SetActiveCollection(Some("C7".to_string())))
            .await;
        assert_eq!(photos.calls(), vec!["collection C7 page=1"]);
    }

    #[tokio::test]
    async fn topic_routing_ignores_the_query() {
        let photos = Arc::new(MockPhotos::default());
        let (mut store, _repo) = store_with(photos.clone());

        store.dispatch(FeedAction::SetQuery("cats".to_string())).await;
        store.dispatch(FeedAction::SetTopic("nature".to_string())).await;
        assert_eq!(
            photos.calls(),
            vec!["search cats page=1", "topic nature page=1"]
        );
    }

    #[tokio::test]
    async fn load_more_appends_the_next_page() {
        let photos = Arc::new(MockPhotos::default());
        photos.queue_photos(page(&["1", "2"]));
        photos.queue_photos(page(&["2", "3"]));
        let (mut store, _repo) = store_with(photos.clone());

        store.reload().await;
        store.load_more().await;

        assert_eq!(photos.calls(), vec!["photos page=1", "photos page=2"]);
        assert_eq!(ids(store.state()), vec!["1", "2", "3"]);
        assert_eq!(store.state().page, 2);
        assert!(store.state().has_more);
    }

    #[tokio::test]
    async fn load_more_is_guarded() {
        let photos = Arc::new(MockPhotos::default());
        let (mut store, _repo) = store_with(photos.clone());

        // initial state is still loading, the trigger is ignored
        store.load_more().await;
        assert!(photos.calls().is_empty());

        // an empty page dried the feed up
        store.reload().await;
        assert!(!store.state().has_more);
        store.load_more().await;
        assert_eq!(photos.calls().len(), 1);
    }

    #[tokio::test]
    async fn failed_fetch_reads_as_an_empty_page() {
        let photos = Arc::new(MockPhotos::default());
        photos.queue_photos(Err("connection reset".to_string()));
        let (mut store, _repo) = store_with(photos.clone());

        store.dispatch(FeedAction::SetColor(Some(Color::Red))).await;

        // never a dangling loading flag, never an error surfaced
        assert!(!store.state().is_loading);
        assert!(!store.state().has_more);
        assert!(store.state().photos.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn debounce_collapses_keystroke_bursts() {
        let photos = Arc::new(MockPhotos::default());
        let (mut store, _repo) = store_with(photos.clone());

        store.search_input("c");
        tokio::time::advance(Duration::from_millis(50)).await;
        store.search_input("ca");
        tokio::time::advance(Duration::from_millis(50)).await;
        store.search_input("cat");

        // the burst is still inside the quiet window
        tokio::time::advance(Duration::from_millis(499)).await;
        tokio::task::yield_now().await;
        assert_eq!(store.pump_pending().await, 0);

        tokio::time::advance(Duration::from_millis(2)).await;
        tokio::task::yield_now().await;
        assert_eq!(store.pump_pending().await, 1);
        assert_eq!(store.state().query, "cat");
        assert_eq!(photos.calls(), vec!["search cat page=1"]);

        // nothing else trickles in afterwards
        tokio::time::advance(Duration::from_millis(600)).await;
        tokio::task::yield_now().await;
        assert_eq!(store.pump_pending().await, 0);
    }

    #[tokio::test]
    async fn browse_collections_routes_search_and_listing() {
        let photos = Arc::new(MockPhotos::default());
        photos.queue_collections(Ok(vec![Collection {
            id: "C1".to_string(),
            title: "Autumn".to_string(),
            ..Default::default()
        }]));
        let (mut store, _repo) = store_with(photos.clone());

        store.browse_collections("autumn", 1).await;
        assert_eq!(store.state().collections.len(), 1);
        assert!(!store.state().is_loading);

        store.browse_collections("  ", 2).await;
        assert_eq!(
            photos.calls(),
            vec![
                "search-collections autumn page=1",
                "collections page=2 per_page=20"
            ]
        );
    }
}
