pub const CONTROL: &str = "control";
pub const TREATMENT: &str = "treatment";

/// Picks the variant whose cumulative weight first exceeds `bucket`.
///
/// Missing weights, or weights whose length differs from `variants`, fall back to an equal
/// `100 / n` split. Whatever the weights leave uncovered goes to the last variant.
pub fn resolve_variant<'a, S>(bucket: u8, variants: &'a [S], weights: Option<&[u32]>) -> &'a str
where
	S: AsRef<str>,
{
	let Some(last) = variants.last() else {
		return CONTROL;
	};
	let equal_share = 100 / variants.len() as u32;
	let weights = weights.filter(|weights| weights.len() == variants.len());
	let mut cumulative = 0_u32;

	for (index, variant) in variants.iter().enumerate() {
		let weight = weights.map(|weights| weights[index]).unwrap_or(equal_share);

		cumulative = cumulative.saturating_add(weight);

		if u32::from(bucket) < cumulative {
			return variant.as_ref();
		}
	}

	last.as_ref()
}
