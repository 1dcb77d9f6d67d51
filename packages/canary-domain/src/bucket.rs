//! Stable bucketing of a (user, experiment) pair.
//!
//! The hash walks UTF-16 code units rather than bytes or chars so that web clients sharing the
//! assignment table land every identifier in the same bucket as the server does.

pub const BUCKET_COUNT: u32 = 100;

/// 32-bit rolling hash over `user_id` followed by `experiment_key`.
///
/// Each step computes `hash * 31 + unit` with signed 32-bit wraparound.
pub fn hash_identity(user_id: &str, experiment_key: &str) -> i32 {
	user_id
		.encode_utf16()
		.chain(experiment_key.encode_utf16())
		.fold(0_i32, |hash, unit| (hash << 5).wrapping_sub(hash).wrapping_add(i32::from(unit)))
}

/// Maps the pair to a bucket in `0..BUCKET_COUNT`.
pub fn bucket(user_id: &str, experiment_key: &str) -> u8 {
	let hash = hash_identity(user_id, experiment_key);

	// `unsigned_abs` keeps `i32::MIN` representable.
	(hash.unsigned_abs() % BUCKET_COUNT) as u8
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn empty_input_hashes_to_zero() {
		assert_eq!(hash_identity("", ""), 0);
		assert_eq!(bucket("", ""), 0);
	}

	#[test]
	fn single_step_multiplies_by_thirty_one() {
		// 'é' is U+00E9 (233), 'x' is 120: 233 * 31 + 120.
		assert_eq!(hash_identity("\u{e9}", "x"), 7_343);
		assert_eq!(bucket("\u{e9}", "x"), 43);
	}

	#[test]
	fn wraps_to_signed_thirty_two_bits() {
		assert_eq!(hash_identity("u-42", "checkout_redesign"), -515_934_092);
		assert_eq!(bucket("u-42", "checkout_redesign"), 92);
	}

	#[test]
	fn astral_characters_hash_as_surrogate_pairs() {
		assert_eq!(hash_identity("\u{1F600}", "k"), 54_959_976);
	}
}
