pub mod analysis;
pub mod document;
pub mod request;
pub mod response;

pub use analysis::*;
pub use document::*;
pub use request::*;
pub use response::*;
