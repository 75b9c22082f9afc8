//! Registry ownership, filtering and attachment
//!
//! Pure logic over server lists and MCPServer labels, plus the attachment
//! operation that writes ownership labels through the server store.

pub mod attachment;
pub mod classifier;
pub mod filter;
pub mod ownership;

pub use attachment::{AttachOutcome, AttachRequest, ServerAttacher};
pub use classifier::{classify, Classification, DeployedServer, ServerSummary};
pub use filter::{apply_filter, paginate, CompiledFilter, Page, ServerQuery};
pub use ownership::Ownership;
