pub mod filters;
pub mod token_status;

pub use filters::{filter_comments, filter_dog_records, filter_records, CommentQuery, RecordQuery};
pub use token_status::{classify, PriceFeed, RandomPriceFeed, TokenQuote};
