pub mod environment;
pub mod feed;

pub use environment::types::{
    AuthError, Collection, Color, Orientation, Photo, UserProfile,
};
pub use environment::{
    setup_logging, AccountApi, AccountService, ApiConfig, Environment, FileStorage,
    KeyValueStorage, MemoryStorage, Model, PhotoApi, Repository,
};
pub use feed::{FeedAction, FeedState, FeedStore, Selection};
