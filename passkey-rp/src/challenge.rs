use passkey_rp_types::rand::random_vec;

/// Produces the challenges handed out by `begin_*`.
#[cfg_attr(any(test, feature = "testable"), mockall::automock)]
pub trait ChallengeGenerator: Send + Sync {
    /// `len` unpredictable bytes.
    fn generate(&self, len: usize) -> Vec<u8>;
}

/// Challenges from the thread local CSPRNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomChallengeGenerator;

impl ChallengeGenerator for RandomChallengeGenerator {
    fn generate(&self, len: usize) -> Vec<u8> {
        random_vec(len)
    }
}

impl<F> ChallengeGenerator for F
where
    F: Fn(usize) -> Vec<u8> + Send + Sync,
{
    fn generate(&self, len: usize) -> Vec<u8> {
        self(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_challenges_differ() {
        let a = RandomChallengeGenerator.generate(32);
        let b = RandomChallengeGenerator.generate(32);
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
    }
}
