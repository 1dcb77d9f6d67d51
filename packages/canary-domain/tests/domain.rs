use std::collections::HashSet;

use canary_domain::{
	CONTROL, Gate, TREATMENT, bucket,
	experiment_key::{self, KeyError},
	gate, normalize_percentage, resolve_variant, rollout_variant,
};

#[test]
fn bucket_is_deterministic() {
	for user in ["u-1", "u-42", "alice", ""] {
		let first = bucket(user, "checkout_redesign");

		for _ in 0..16 {
			assert_eq!(bucket(user, "checkout_redesign"), first);
		}
	}
}

#[test]
fn bucket_matches_known_values() {
	assert_eq!(bucket("u-1", "checkout_redesign"), 7);
	assert_eq!(bucket("carol", "checkout_redesign"), 29);
	assert_eq!(bucket("u-2", "checkout_redesign"), 60);
	assert_eq!(bucket("dave", "pricing_page"), 0);
}

#[test]
fn bucket_stays_in_range_and_covers_it() {
	let mut seen = HashSet::new();

	for i in 0..1_000 {
		let value = bucket(&format!("user-{i}"), "checkout_redesign");

		assert!(value < 100, "bucket {value} out of range");

		seen.insert(value);
	}

	assert_eq!(seen.len(), 100);
}

#[test]
fn bucket_spreads_evenly() {
	let mut counts = [0_u32; 100];

	for i in 0..10_000 {
		counts[bucket(&format!("user-{i}"), "checkout_redesign") as usize] += 1;
	}

	assert!(counts.iter().all(|count| (80..=120).contains(count)), "uneven spread: {counts:?}");
}

#[test]
fn bucket_is_sensitive_to_both_inputs() {
	let changed_key = (0..200)
		.filter(|i| {
			let user = format!("user-{i}");

			bucket(&user, "checkout_redesign") != bucket(&user, "pricing_page")
		})
		.count();
	let changed_user = (0..200)
		.filter(|i| {
			bucket(&format!("user-{i}"), "checkout_redesign")
				!= bucket(&format!("member-{i}"), "checkout_redesign")
		})
		.count();

	assert!(changed_key > 150, "only {changed_key} of 200 buckets moved with the key");
	assert!(changed_user > 150, "only {changed_user} of 200 buckets moved with the user");
}

#[test]
fn empty_variants_resolve_to_control() {
	let variants: [&str; 0] = [];

	assert_eq!(resolve_variant(42, &variants, None), CONTROL);
}

#[test]
fn equal_split_gives_last_variant_the_remainder() {
	let variants = ["a", "b", "c"];

	assert_eq!(resolve_variant(0, &variants, None), "a");
	assert_eq!(resolve_variant(32, &variants, None), "a");
	assert_eq!(resolve_variant(33, &variants, None), "b");
	assert_eq!(resolve_variant(65, &variants, None), "b");
	assert_eq!(resolve_variant(66, &variants, None), "c");
	// 3 * 33 = 99, bucket 99 falls through to the last variant.
	assert_eq!(resolve_variant(99, &variants, None), "c");
}

#[test]
fn explicit_weights_drive_boundaries() {
	let variants = ["control", "blue", "green"];
	let weights: [u32; 3] = [50, 25, 25];

	assert_eq!(resolve_variant(49, &variants, Some(weights.as_slice())), "control");
	assert_eq!(resolve_variant(50, &variants, Some(weights.as_slice())), "blue");
	assert_eq!(resolve_variant(74, &variants, Some(weights.as_slice())), "blue");
	assert_eq!(resolve_variant(75, &variants, Some(weights.as_slice())), "green");
}

#[test]
fn mismatched_weights_fall_back_to_equal_split() {
	let variants = ["a", "b"];
	let weights: [u32; 1] = [90];

	assert_eq!(resolve_variant(49, &variants, Some(weights.as_slice())), "a");
	assert_eq!(resolve_variant(50, &variants, Some(weights.as_slice())), "b");
}

#[test]
fn short_weights_leave_remainder_to_last_variant() {
	let variants = ["a", "b"];
	let weights: [u32; 2] = [10, 10];

	assert_eq!(resolve_variant(95, &variants, Some(weights.as_slice())), "b");
}

#[test]
fn rollout_boundary_is_exclusive() {
	for rollout in [1, 30, 50, 99] {
		for value in 0..100_u8 {
			let expected = if i32::from(value) < rollout { TREATMENT } else { CONTROL };

			assert_eq!(rollout_variant(value, rollout), expected, "bucket {value} at {rollout}%");
		}
	}
}

#[test]
fn gate_orders_short_circuits() {
	assert_eq!(gate(false, 100), Gate::Disabled);
	assert_eq!(gate(false, 0), Gate::Disabled);
	assert_eq!(gate(true, 100), Gate::FullyRolledOut);
	assert_eq!(gate(true, 0), Gate::NotRolledOut);
	assert_eq!(gate(true, 30), Gate::Bucketed { rollout_percentage: 30 });

	assert_eq!(Gate::Disabled.short_circuit(), Some(CONTROL));
	assert_eq!(Gate::NotRolledOut.short_circuit(), Some(CONTROL));
	assert_eq!(Gate::FullyRolledOut.short_circuit(), Some(TREATMENT));
	assert_eq!(Gate::Bucketed { rollout_percentage: 30 }.short_circuit(), None);
}

#[test]
fn gate_serializes_with_tag() {
	let value = serde_json::to_value(Gate::Bucketed { rollout_percentage: 30 })
		.expect("Failed to serialize gate.");

	assert_eq!(value, serde_json::json!({ "gate": "bucketed", "rollout_percentage": 30 }));
}

#[test]
fn percentage_is_clamped_and_rounded() {
	assert_eq!(normalize_percentage(-5.0), Some(0));
	assert_eq!(normalize_percentage(150.0), Some(100));
	assert_eq!(normalize_percentage(29.5), Some(30));
	assert_eq!(normalize_percentage(29.49), Some(29));
	assert_eq!(normalize_percentage(f64::NAN), None);
	assert_eq!(normalize_percentage(f64::INFINITY), None);
}

#[test]
fn experiment_keys_are_validated() {
	assert_eq!(experiment_key::validate_key("checkout_redesign"), Ok(()));
	assert_eq!(experiment_key::validate_key("v2.pricing-page"), Ok(()));
	assert_eq!(experiment_key::validate_key(""), Err(KeyError::Empty));
	assert_eq!(experiment_key::validate_key("has space"), Err(KeyError::InvalidCharacter(' ')));
	assert_eq!(experiment_key::validate_key(&"k".repeat(129)), Err(KeyError::TooLong));
}
