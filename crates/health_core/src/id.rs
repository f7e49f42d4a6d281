use rand::Rng;
use uuid::Uuid;

use crate::StormId;

/// Generate a deterministic v4-format UUID from a seeded RNG.
pub fn generate_uuid(rng: &mut impl Rng) -> Uuid {
    let bytes: [u8; 16] = rng.gen();
    uuid::Builder::from_random_bytes(bytes).into_uuid()
}

/// Storm ids come from the simulation RNG.
pub(crate) fn next_storm_id(rng: &mut impl Rng) -> StormId {
    StormId(format!("storm_{}", generate_uuid(rng).simple()))
}
