//! Synthetic value catalog.
//!
//! Word-list generators for the handful of shapes the anonymizer needs.
//! Values only have to look plausible; they carry no information.

use rand::Rng;

const FIRST_NAMES: &[&str] = &[
    "Alex", "Bailey", "Casey", "Dana", "Eli", "Frankie", "Gray", "Harper", "Indra", "Jules",
    "Kai", "Lane", "Morgan", "Noel", "Oakley", "Parker", "Quinn", "Riley", "Sage", "Tatum",
];

const LAST_NAMES: &[&str] = &[
    "Adams", "Baker", "Carter", "Diaz", "Evans", "Foster", "Garcia", "Hayes", "Ibarra",
    "Jensen", "Keller", "Lopez", "Mercer", "Nolan", "Ortiz", "Price", "Quigley", "Reyes",
    "Santos", "Turner",
];

const WORDS: &[&str] = &[
    "amber", "basin", "cedar", "delta", "ember", "fable", "glade", "harbor", "inlet", "juniper",
    "kestrel", "lumen", "meadow", "north", "orchard", "pebble", "quarry", "ridge", "summit",
    "thicket", "umber", "vale", "willow", "yonder", "zephyr",
];

const EMAIL_DOMAINS: &[&str] = &["example.com", "example.org", "example.net", "mail.test"];

fn pick<'a>(rng: &mut impl Rng, items: &'a [&'a str]) -> &'a str {
    items[rng.gen_range(0..items.len())]
}

/// A syntactically valid, clearly synthetic email address.
pub fn email(rng: &mut impl Rng) -> String {
    format!(
        "{}.{}{}@{}",
        pick(rng, FIRST_NAMES).to_lowercase(),
        pick(rng, LAST_NAMES).to_lowercase(),
        rng.gen_range(1..10_000),
        pick(rng, EMAIL_DOMAINS)
    )
}

/// A phone number in a simple international-looking format.
pub fn phone(rng: &mut impl Rng) -> String {
    format!(
        "+1-555-{:03}-{:04}",
        rng.gen_range(0..1_000),
        rng.gen_range(0..10_000)
    )
}

/// A person name drawn from the first/last word lists.
pub fn person_name(rng: &mut impl Rng) -> String {
    format!("{} {}", pick(rng, FIRST_NAMES), pick(rng, LAST_NAMES))
}

/// A short sentence of lowercase words.
pub fn sentence(rng: &mut impl Rng) -> String {
    let count = rng.gen_range(4..9);
    let mut words = Vec::with_capacity(count);
    for _ in 0..count {
        words.push(pick(rng, WORDS));
    }
    let mut s = words.join(" ");
    if let Some(first) = s.get_mut(0..1) {
        first.make_ascii_uppercase();
    }
    s.push('.');
    s
}

/// A random lowercase letter string of exactly `len` characters.
pub fn letters(rng: &mut impl Rng, len: usize) -> String {
    (0..len)
        .map(|_| char::from(b'a' + rng.gen_range(0..26u8)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shape() {
        let mut rng = rand::thread_rng();
        for _ in 0..10 {
            let e = email(&mut rng);
            let (local, domain) = e.split_once('@').expect("email has an @");
            assert!(!local.is_empty());
            assert!(domain.contains('.'));
        }
    }

    #[test]
    fn phone_shape() {
        let mut rng = rand::thread_rng();
        let p = phone(&mut rng);
        assert!(p.starts_with("+1-555-"));
        assert_eq!(p.len(), "+1-555-000-0000".len());
    }

    #[test]
    fn person_name_has_two_parts() {
        let mut rng = rand::thread_rng();
        let n = person_name(&mut rng);
        assert_eq!(n.split_whitespace().count(), 2);
    }

    #[test]
    fn sentence_ends_with_period() {
        let mut rng = rand::thread_rng();
        let s = sentence(&mut rng);
        assert!(s.ends_with('.'));
        assert!(s.split_whitespace().count() >= 4);
    }

    #[test]
    fn letters_length_is_exact() {
        let mut rng = rand::thread_rng();
        for len in [0, 1, 7, 40] {
            assert_eq!(letters(&mut rng, len).len(), len);
        }
    }
}
