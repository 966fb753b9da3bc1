//! Keyed slot permutation and chip sequence (spec.md §4.5).
//!
//! The PRNG stream is consumed in exactly shuffle-then-chips order so
//! embedder and detector regenerate bit-identical `(slots, chips)`.

use crate::prng::Xorshift64Star;

/// Fisher-Yates shuffle of `order`, consuming `rng` from the end down.
fn fisher_yates_shuffle(rng: &mut Xorshift64Star, order: &mut [usize]) {
    let mut i = order.len();
    while i > 1 {
        i -= 1;
        let j = (rng.next_u64() % (i as u64 + 1)) as usize;
        order.swap(i, j);
    }
}

/// Produces a pseudorandom permutation of `[0, total_slots)` truncated to
/// `needed_slots` entries, plus a matching-length ±1 chip sequence, both
/// derived from `key` with domain separation (`"spread-v1:"` prefix).
pub fn shuffled_slots_and_chips(
    key: &str,
    total_slots: usize,
    needed_slots: usize,
) -> (Vec<usize>, Vec<i8>) {
    if total_slots == 0 || needed_slots == 0 {
        return (Vec::new(), Vec::new());
    }
    let needed_slots = needed_slots.min(total_slots);

    let mut rng = Xorshift64Star::from_key(&format!("spread-v1:{key}"));

    let mut order: Vec<usize> = (0..total_slots).collect();
    fisher_yates_shuffle(&mut rng, &mut order);

    let chips: Vec<i8> = (0..needed_slots)
        .map(|_| if rng.next_pm1() < 0.0 { -1 } else { 1 })
        .collect();

    order.truncate(needed_slots);
    (order, chips)
}
