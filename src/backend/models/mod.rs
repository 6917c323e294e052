pub mod value;

pub use value::{BlockRef, Value};
