use std::{sync::Arc, time::Duration};

use rtag_service::{EstimateOutcome, estimator};

use super::scenario;

#[tokio::test]
async fn counts_every_query_within_budget() {
	let (queries, index) = scenario();
	let estimate = estimator::estimate(&queries, Arc::new(index), 2, Duration::from_secs(5)).await;

	assert!(estimate.is_complete());
	assert_eq!(estimate.hint(1), Some(2));
	assert_eq!(estimate.hint(2), Some(2));
	assert_eq!(estimate.hint(3), Some(0));
}

#[tokio::test]
async fn slow_counts_are_dropped_at_the_deadline() {
	let (queries, index) = scenario();
	let index = index.with_count_delay(2, Duration::from_secs(30));
	let started = tokio::time::Instant::now();
	let estimate =
		estimator::estimate(&queries, Arc::new(index), 3, Duration::from_millis(200)).await;

	assert!(started.elapsed() < Duration::from_secs(10));
	assert_eq!(estimate.outcome, EstimateOutcome::Partial { timed_out: vec![2], failed: vec![] });
	assert_eq!(estimate.hint(1), Some(2));
	assert_eq!(estimate.hint(2), None);
	assert_eq!(estimate.hint(3), Some(0));
}

#[tokio::test]
async fn failed_counts_are_reported_without_aborting_others() {
	let (queries, index) = scenario();
	let index = index.with_count_failure(1);
	let estimate = estimator::estimate(&queries, Arc::new(index), 1, Duration::from_secs(5)).await;

	assert_eq!(estimate.outcome, EstimateOutcome::Partial { timed_out: vec![], failed: vec![1] });
	assert_eq!(estimate.hint(1), None);
	assert_eq!(estimate.hint(2), Some(2));
}

#[tokio::test]
async fn panicked_counts_are_failed_not_timed_out() {
	let (queries, index) = scenario();
	let index = index.with_count_panic(1).with_count_delay(2, Duration::from_secs(30));
	let estimate =
		estimator::estimate(&queries, Arc::new(index), 3, Duration::from_millis(200)).await;

	assert_eq!(estimate.outcome, EstimateOutcome::Partial { timed_out: vec![2], failed: vec![1] });
	assert_eq!(estimate.hint(1), None);
	assert_eq!(estimate.hint(3), Some(0));
}
