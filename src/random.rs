use crate::Error;
use rand::rngs::OsRng;
use rand::{TryCryptoRng, TryRngCore};

/// Fills a fresh buffer with `N` secure random bytes from `rng`.
///
/// Failure is reported as [`Error::EntropyUnavailable`] and nothing derived
/// from the partially filled buffer escapes.
pub(crate) fn random_bytes_from<R, const N: usize>(rng: &mut R) -> Result<Box<[u8; N]>, Error>
where
    R: TryRngCore + TryCryptoRng + ?Sized,
{
    let mut bytes = Box::new([0u8; N]);
    if let Err(err) = rng.try_fill_bytes(bytes.as_mut_slice()) {
        tracing::error!(target: "duet::random", error = %err, "secure randomness unavailable");
        return Err(Error::EntropyUnavailable);
    }

    Ok(bytes)
}

/// Fills a fresh buffer with `N` bytes from the operating system.
pub(crate) fn random_bytes<const N: usize>() -> Result<Box<[u8; N]>, Error> {
    random_bytes_from::<_, N>(&mut OsRng)
}
