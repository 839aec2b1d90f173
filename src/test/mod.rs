
pub use builder::{PeBuilder, TestSection};
