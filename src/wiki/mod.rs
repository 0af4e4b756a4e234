//! Wiki link resolution

pub mod api;
pub mod encoding;
pub mod lookup;
pub mod normalize;
pub mod project;
pub mod query;
pub mod resolver;
pub mod search;
pub mod site;
pub mod tracker;

pub use api::MediaWikiClient;
pub use lookup::PageFetcher;
pub use project::ProjectRegistry;
pub use query::QueryParams;
pub use resolver::{CallerScope, Outcome, Resolution, ResolutionRequest, Resolver};
pub use site::Wiki;
pub use tracker::IssueTrackers;
