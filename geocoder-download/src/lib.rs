//! The concurrent download/cache fabric (`SPEC_FULL.md` §4.4): one worker
//! thread, `max_tasks_per_worker` in-flight tasks, a content-addressed cache
//! consulted on the first attempt only, and a retry loop with jitter that
//! surfaces exhaustion as a record rather than aborting the stream.

pub mod cache;
pub mod fabric;
pub mod fetch;
pub mod request;

pub use cache::{ContentCache, FsCache, NoCache};
pub use fabric::{DownloadFabric, FabricConfig};
pub use fetch::{Fetcher, UreqFetcher};
pub use request::{DownloadOutcome, DownloadPayload, DownloadProcessError, DownloadRequest};
