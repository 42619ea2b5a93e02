use rand::Rng;

/// Generates the human-displayable tokens that identify accounts and
/// ledger entries: `KM` + 10 characters for account numbers, `TXN` + 12
/// for transaction references.
///
/// Entropy alone makes collisions unlikely; the store's uniqueness
/// constraints are the backstop, and callers regenerate on a reported
/// collision. A token is produced before the entity's first durable write
/// and never regenerated after it persists.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReferenceGenerator;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

impl ReferenceGenerator {
    pub const ACCOUNT_PREFIX: &'static str = "KM";
    pub const TRANSACTION_PREFIX: &'static str = "TXN";

    pub fn new() -> Self {
        Self
    }

    pub fn account_number(&self) -> String {
        self.token(Self::ACCOUNT_PREFIX, 10)
    }

    pub fn transaction_reference(&self) -> String {
        self.token(Self::TRANSACTION_PREFIX, 12)
    }

    fn token(&self, prefix: &str, len: usize) -> String {
        let mut rng = rand::thread_rng();
        let mut out = String::with_capacity(prefix.len() + len);
        out.push_str(prefix);
        for _ in 0..len {
            let idx = rng.gen_range(0..ALPHABET.len());
            out.push(ALPHABET[idx] as char);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::ReferenceGenerator;

    #[test]
    fn tokens_have_the_expected_shape() {
        let gen_refs = ReferenceGenerator::new();
        let number = gen_refs.account_number();
        assert!(number.starts_with("KM"));
        assert_eq!(number.len(), 12);

        let reference = gen_refs.transaction_reference();
        assert!(reference.starts_with("TXN"));
        assert_eq!(reference.len(), 15);
        assert!(
            reference[3..]
                .bytes()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
        );
    }

    #[test]
    fn a_batch_of_tokens_is_distinct() {
        let gen_refs = ReferenceGenerator::new();
        let refs: HashSet<String> = (0..1_000)
            .map(|_| gen_refs.transaction_reference())
            .collect();
        assert_eq!(refs.len(), 1_000);
    }
}
