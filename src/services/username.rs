use rand::{rngs::OsRng, seq::SliceRandom, Rng};

const ADJECTIVES: &[&str] = &[
    "Happy", "Swift", "Brave", "Clever", "Calm", "Bright", "Cosmic", "Gentle", "Lucky", "Quiet",
    "Witty", "Bold", "Mellow", "Sunny", "Misty", "Noble",
];

const NOUNS: &[&str] = &[
    "Panda", "Falcon", "Otter", "Tiger", "Comet", "River", "Maple", "Fox", "Owl", "Wolf", "Koala",
    "Raven", "Lynx", "Heron", "Cedar", "Pixel",
];

pub struct UsernameGenerator;

impl UsernameGenerator {
    /// Random `AdjectiveNoun####` display name with a 1-4 digit suffix.
    ///
    /// No uniqueness check: identity is the guest id, the name is display only.
    pub fn generate() -> String {
        let mut rng = OsRng;
        let adjective = ADJECTIVES.choose(&mut rng).copied().unwrap_or("Happy");
        let noun = NOUNS.choose(&mut rng).copied().unwrap_or("Panda");
        let suffix: u16 = rng.gen_range(0..=9999);
        format!("{}{}{}", adjective, noun, suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::guest::is_valid_username;

    #[test]
    fn test_generated_names_are_valid_usernames() {
        for _ in 0..200 {
            let name = UsernameGenerator::generate();
            assert!(is_valid_username(&name), "invalid generated name {}", name);
        }
    }

    #[test]
    fn test_name_format() {
        let name = UsernameGenerator::generate();
        let digits = name.chars().rev().take_while(|c| c.is_ascii_digit()).count();
        assert!((1..=4).contains(&digits));
        assert!(ADJECTIVES.iter().any(|a| name.starts_with(a)));
    }
}
