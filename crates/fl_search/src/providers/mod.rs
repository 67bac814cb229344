pub mod static_results;
pub mod tavily;

pub use static_results::StaticSearch;
pub use tavily::TavilySearch;
