//! Access-token generation.

/// Generates a random 32-character hex string (128 bits of entropy).
///
/// Room access providers use this to mint tokens: a secret shared only
/// between the room, the master, and the one client it was granted to.
/// 128 bits makes guessing a live token computationally infeasible, and
/// tokens are single-use anyway.
pub fn generate_access_token() -> String {
    use rand::Rng;
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
