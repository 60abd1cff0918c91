use {
    anyhow::{Error, anyhow, bail, ensure},
    rand::{
        distr::{Alphanumeric, SampleString},
        rand_core,
        rngs::OsRng,
    },
    serde::{Deserialize, Deserializer, Serialize, de},
    std::{
        any::Any,
        borrow::Cow,
        fmt::{self, Debug},
        panic::catch_unwind,
        str::FromStr,
    },
};

/// Secret token used by a client to identify itself to the blob store.
///
/// The token only grants access to the store. It has nothing to do with the
/// passphrase that encrypts file contents, which never leaves the client.
#[derive(Clone, PartialEq, Eq, Hash, Serialize)]
pub struct AccessToken(String);

const ACCESS_TOKEN_LENGTH: usize = 64;

fn format_panic_message(err: &(dyn Any + Send + 'static)) -> String {
    err.downcast_ref::<&'static str>()
        .map(|&s| s.to_owned())
        .or_else(|| err.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| format!("{err:?}"))
}

impl AccessToken {
    /// Generates a token from the OS random source.
    #[inline]
    pub fn generate() -> anyhow::Result<Self> {
        // `UnwrapErr` panics if the OS source fails.
        catch_unwind(|| {
            Self(Alphanumeric.sample_string(&mut rand_core::UnwrapErr(OsRng), ACCESS_TOKEN_LENGTH))
        })
        .map_err(|err| anyhow!(format_panic_message(&*err)))
    }

    #[must_use]
    #[inline]
    pub fn as_unmasked_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for AccessToken {
    type Err = Error;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ensure!(
            s.len() == ACCESS_TOKEN_LENGTH,
            "invalid length; got {}, expected {ACCESS_TOKEN_LENGTH}",
            s.len(),
        );
        if let Some(c) = s.chars().find(|c| !c.is_ascii_alphanumeric()) {
            bail!("must be alphanumeric but contains invalid character `{c}`");
        }
        Ok(Self(s.to_owned()))
    }
}

impl<'de> Deserialize<'de> for AccessToken {
    #[inline]
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Cow::<'_, str>::deserialize(deserializer)?
            .parse()
            .map_err(de::Error::custom)
    }
}

impl Debug for AccessToken {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken").finish()
    }
}
