//! Counters collected during a crawl run

use std::time::Duration;

/// Crawl statistics summary
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrawlStats {
    /// Responses handed to the strategy
    pub documents: u64,

    /// Requests that ended without a document after all retries
    pub failed_requests: u64,

    /// Documents whose extractors failed
    pub extract_errors: u64,

    /// Requests enqueued, start URLs included
    pub requests_enqueued: u64,

    /// Attempts repeated after a proxy failure
    pub retries: u64,

    /// Responses with a ban status code
    pub bans: u64,

    /// Items routed through the pipeline
    pub items_processed: u64,

    /// Items skipped because every processor already handled them
    pub items_skipped: u64,

    /// Proxy refreshes started by the crawler
    pub proxy_refreshes: u64,

    pub elapsed: Duration,
}

impl CrawlStats {
    /// Share of dispatched requests that produced a document, in percent
    pub fn success_rate(&self) -> f64 {
        let attempted = self.documents + self.failed_requests;
        if attempted == 0 {
            0.0
        } else {
            (self.documents as f64 / attempted as f64) * 100.0
        }
    }

    /// Prints the statistics to stdout in a formatted manner
    pub fn print(&self) {
        println!("=== Crawl Statistics ===\n");

        println!("Requests:");
        println!("  Enqueued: {}", self.requests_enqueued);
        println!("  Documents fetched: {}", self.documents);
        println!("  Failed: {}", self.failed_requests);
        println!("  Retries: {}", self.retries);
        println!("  Bans: {}", self.bans);
        println!();

        println!("Items:");
        println!("  Processed: {}", self.items_processed);
        println!("  Skipped (already processed): {}", self.items_skipped);
        println!("  Extraction errors: {}", self.extract_errors);
        println!();

        println!("Proxy refreshes: {}", self.proxy_refreshes);
        println!(
            "Success Rate: {:.1}% in {:.1}s",
            self.success_rate(),
            self.elapsed.as_secs_f64()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_rate() {
        let stats = CrawlStats {
            documents: 3,
            failed_requests: 1,
            ..CrawlStats::default()
        };
        assert!((stats.success_rate() - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_success_rate_without_requests() {
        assert_eq!(CrawlStats::default().success_rate(), 0.0);
    }
}
