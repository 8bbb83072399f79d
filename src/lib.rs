mod batch;
mod classify;
mod config;
mod error;
mod fetch;
mod observe;
mod pipeline;
mod series;
mod store;
mod stream;
mod trigger;
mod types;
mod utils;

pub use error::PipelineError;
pub use config::*;

pub use batch::*;
pub use classify::*;
pub use observe::*;
pub use pipeline::*;
pub use series::StationSeries;
pub use trigger::*;

pub use fetch::noaa_client::*;
pub use fetch::paginate::*;
pub use fetch::RecordSource;

pub use store::file::FileStore;
pub use store::getter::WeatherGetter;
pub use store::memory::MemoryStore;
pub use store::putter::WeatherPutter;
pub use store::{
    KeyCondition, KeyValueStore, QueryPage, DEFAULT_MAX_BATCH_WRITE, DEFAULT_QUERY_PAGE_SIZE,
};

pub use stream::channel::{channel, ChannelStream, StreamReceiver};
pub use stream::{EventStream, StreamRecord};

pub use types::datatype::*;
pub use types::location::*;
pub use types::page::*;
pub use types::record::*;

pub use fetch::error::FetchError;
pub use store::error::StoreError;
pub use stream::error::StreamError;
