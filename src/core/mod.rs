pub mod error;
pub mod types;
pub mod value;

pub use error::{Result, StoreError};
pub use types::{Column, DataType, RecordId, Row, Schema};
pub use value::{Value, sentinel_timestamp};
