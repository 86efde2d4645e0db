/// Wisp Crypto Library
///
/// Two token families, one per message class:
/// - `envelope`: secret messages. A random 256-bit bearer secret doubles as
///   the share link; the content key is derived from it with Argon2id and the
///   store only ever holds a one-way digest of the secret.
/// - `wordtoken`: ordinary messages. Pronounceable tokens built from fixed
///   vocabularies; memorable, collision-checked by the allocator, and not
///   secrets.
pub mod envelope;
pub mod wordtoken;
