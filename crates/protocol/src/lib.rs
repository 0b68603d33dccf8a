pub mod value_format;

pub use value_format::{TimeUnit, ValueFormatter};
