pub mod extractor;
pub mod narrator;
pub mod notifier;
pub mod report;
