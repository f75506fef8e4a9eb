//! Arithmetic behind the periodic consolidation trigger.
//!
//! The authoritative count may lag behind a just-written turn, so the effective count is the larger
//! of the store's answer and the in-process hint.

pub fn effective_count(authoritative: u64, local_hint: u64) -> u64 {
	authoritative.max(local_hint)
}

pub fn is_due(effective: u64, every: u64) -> bool {
	every > 0 && effective > 0 && effective % every == 0
}

pub fn next_trigger_at(effective: u64, every: u64) -> u64 {
	let every = every.max(1);

	(effective / every + 1) * every
}

pub fn turns_until_trigger(effective: u64, every: u64) -> u64 {
	let every = every.max(1);

	match effective % every {
		0 => every,
		rem => every - rem,
	}
}
