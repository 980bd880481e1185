// flarm-net/src/lib.rs
pub mod github;
pub mod http;
pub mod validation;

pub use github::{parse_release_assets, GithubClient};
pub use validation::validate_url;
