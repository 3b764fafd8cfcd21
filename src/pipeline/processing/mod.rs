// Table transforms: cleaning, enrichment, aggregation

pub mod aggregate;
pub mod clean;
pub mod enrich;
pub mod timestamps;

pub use aggregate::{Aggregator, DailyAggregator};
pub use clean::{Cleaner, EventCleaner};
pub use enrich::{Enricher, SegmentEnricher};
