use rand::Rng;

/// Adjectives open every token, so none may start with the secret-token
/// marker letter.
const ADJECTIVES: &[&str] = &[
    "bold", "brave", "breezy", "calm", "cozy", "crisp", "dapper", "fuzzy",
    "gentle", "golden", "happy", "jolly", "kind", "lively", "lucky", "mellow",
    "merry", "nifty", "plucky", "proud", "quick", "quiet", "rosy", "shiny",
    "snug", "sunny", "swift", "tidy", "vivid", "warm", "witty", "zesty",
];

const NOUNS: &[&str] = &[
    "acorn", "badger", "beacon", "brook", "cedar", "clover", "comet", "dune",
    "falcon", "fern", "harbor", "heron", "lagoon", "lantern", "maple", "meadow",
    "nutmeg", "orchid", "otter", "pebble", "pine", "plum", "poppy", "quartz",
    "raven", "reef", "sparrow", "spruce", "thicket", "tulip", "walnut", "willow",
];

/// Closed separator alphabet; every character is URL-path safe and easy to
/// read aloud.
const SEPARATORS: &[char] = &['-', '.', '~'];

/// Strides rotating the separator choice. Walking a prime-stride cycle keeps
/// longer tokens from repeating one grouping pattern.
const STRIDES: &[usize] = &[2, 3, 5, 7];

/// Build a pronounceable token of `complexity` words.
///
/// Not a secret: tokens from here are memorable lookup keys whose uniqueness
/// is the allocator's job, so the thread RNG is plenty.
pub fn generate(complexity: usize) -> String {
    generate_with(&mut rand::rng(), complexity)
}

/// Same as [`generate`], over a caller-provided randomness source. Pure in
/// structure: `complexity` words, `complexity - 1` separators, O(complexity).
pub fn generate_with<R: Rng + ?Sized>(rng: &mut R, complexity: usize) -> String {
    let words = complexity.max(1);
    let mut token = String::new();

    for i in 0..words {
        if i > 0 {
            let stride = STRIDES[i % STRIDES.len()];
            token.push(SEPARATORS[(i * stride) % SEPARATORS.len()]);
        }
        let word = if i % 2 == 0 {
            ADJECTIVES[rng.random_range(0..ADJECTIVES.len())]
        } else {
            NOUNS[rng.random_range(0..NOUNS.len())]
        };
        token.push_str(word);
    }

    token
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn structure_matches_complexity() {
        let mut rng = StdRng::seed_from_u64(7);
        for complexity in 1..=12 {
            let token = generate_with(&mut rng, complexity);
            let separators = token
                .chars()
                .filter(|c| SEPARATORS.contains(c))
                .count();
            assert_eq!(separators, complexity - 1, "token {token:?}");
        }
    }

    #[test]
    fn zero_complexity_still_yields_one_word() {
        let mut rng = StdRng::seed_from_u64(7);
        let token = generate_with(&mut rng, 0);
        assert!(ADJECTIVES.contains(&token.as_str()));
    }

    #[test]
    fn deterministic_under_a_fixed_seed() {
        let a = generate_with(&mut StdRng::seed_from_u64(42), 4);
        let b = generate_with(&mut StdRng::seed_from_u64(42), 4);
        assert_eq!(a, b);
    }

    #[test]
    fn never_shadows_the_secret_marker() {
        // Secret tokens are recognized by their leading marker; a word token
        // starting the same way would be digested on lookup and never found.
        for word in ADJECTIVES {
            assert!(!word.starts_with(crate::envelope::SECRET_MARKER));
        }
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..256 {
            let token = generate_with(&mut rng, 3);
            assert!(!crate::envelope::is_secret_token(&token));
        }
    }

    #[test]
    fn charset_is_url_safe() {
        let mut rng = StdRng::seed_from_u64(9);
        for complexity in 1..=8 {
            let token = generate_with(&mut rng, complexity);
            assert!(
                token
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || SEPARATORS.contains(&c)),
                "token {token:?}"
            );
        }
    }

    #[test]
    fn every_word_is_long_enough() {
        for word in ADJECTIVES.iter().chain(NOUNS) {
            assert!(word.len() >= 4, "word {word:?} under the minimum token length");
        }
    }
}
