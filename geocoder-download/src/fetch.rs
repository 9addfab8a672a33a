//! The actual URL → bytes transport, kept outside the fabric's retry/cache
//! concern (§6: "the fabric only needs URL → bytes"). Grounded on
//! `lindera-assets`'s `ureq::get(...).call()` fetch.

use std::io::Read;

pub trait Fetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, String>;
}

/// A blocking `ureq` agent, reused across calls so repeated requests to the
/// same host share a connection pool (the closest a blocking client gets to
/// the HTTP/2 multiplexing the design calls for over a single TCP connection).
pub struct UreqFetcher {
    agent: ureq::Agent,
}

impl UreqFetcher {
    pub fn new() -> Self {
        UreqFetcher {
            agent: ureq::AgentBuilder::new().build(),
        }
    }
}

impl Default for UreqFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetcher for UreqFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, String> {
        let resp = self.agent.get(url).call().map_err(|e| e.to_string())?;
        let mut bytes = Vec::new();
        resp.into_reader()
            .read_to_end(&mut bytes)
            .map_err(|e| e.to_string())?;
        Ok(bytes)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::Fetcher;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails the first `fail_times` calls, then succeeds, returning `url`'s
    /// bytes as the payload. Used to exercise the fabric's retry loop without
    /// touching the network.
    pub struct FlakyFetcher {
        fail_times: usize,
        calls: AtomicUsize,
    }

    impl FlakyFetcher {
        pub fn new(fail_times: usize) -> Self {
            FlakyFetcher {
                fail_times,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Fetcher for FlakyFetcher {
        fn fetch(&self, url: &str) -> Result<Vec<u8>, String> {
            let attempt = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt <= self.fail_times {
                Err(format!("simulated failure {attempt} for {url}"))
            } else {
                Ok(url.as_bytes().to_vec())
            }
        }
    }

    pub struct AlwaysFailsFetcher;

    impl Fetcher for AlwaysFailsFetcher {
        fn fetch(&self, url: &str) -> Result<Vec<u8>, String> {
            Err(format!("simulated permanent failure for {url}"))
        }
    }
}
